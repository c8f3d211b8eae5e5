//! SQLite knowledge-base connections.
//!
//! Build-time commands (`init`, `index`) open the database read-write;
//! the serving path opens it read-only since the index is never
//! mutated after a build.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::PipelineError;

fn options(config: &Config) -> Result<SqliteConnectOptions> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.db.path.display()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    Ok(opts)
}

/// Open the knowledge base read-write, creating the file if missing.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if let Some(parent) = config.db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options(config)?.create_if_missing(true))
        .await?;

    Ok(pool)
}

/// Open the knowledge base read-only for serving. A missing or
/// unreadable database is an [`PipelineError::IndexUnavailable`]
/// condition, not a reason to create an empty one.
pub async fn connect_readonly(config: &Config) -> Result<SqlitePool, PipelineError> {
    if !config.db.path.exists() {
        return Err(PipelineError::index_unavailable(format!(
            "database not found at {} (run `bia init` and `bia index` first)",
            config.db.path.display()
        )));
    }

    let opts = options(config)
        .map_err(|e| PipelineError::index_unavailable(e.to_string()))?
        .read_only(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .map_err(|e| {
            PipelineError::index_unavailable(format!(
                "cannot open {}: {}",
                config.db.path.display(),
                e
            ))
        })
}
