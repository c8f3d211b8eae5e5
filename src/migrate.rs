use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Index build states recorded in `kb_meta`. Serving refuses anything
/// other than `ready` so a partially written index fails closed.
pub const INDEX_STATE_BUILDING: &str = "building";
pub const INDEX_STATE_READY: &str = "ready";

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all knowledge-base tables on an open pool. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Summary documents: one row per statistical slice.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summary_documents (
            id TEXT PRIMARY KEY,
            slice_kind TEXT NOT NULL,
            slice_value TEXT NOT NULL,
            narrative TEXT NOT NULL,
            chart_id TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding vectors, one per summary document, stored as
    // little-endian f32 blobs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_vectors (
            doc_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (doc_id) REFERENCES summary_documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Build metadata: index state fence, embedding model identity and
    // dimensionality for compatibility checks at load time.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summary_documents_kind ON summary_documents(slice_kind)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
