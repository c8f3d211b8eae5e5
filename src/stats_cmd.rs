//! Knowledge-base statistics and health overview.
//!
//! Quick summary of what's indexed: document counts per slice kind,
//! embedding coverage, index state, and database size. Used by
//! `bia stats` to confirm a build completed before serving questions.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    if !config.db.path.exists() {
        println!("BI Assistant — Knowledge Base Stats");
        println!("===================================");
        println!();
        println!("  no database at {} (run `bia init`)", config.db.path.display());
        return Ok(());
    }

    let pool = db::connect(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summary_documents")
        .fetch_one(&pool)
        .await?;

    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_vectors")
        .fetch_one(&pool)
        .await?;

    let index_state: Option<String> =
        sqlx::query_scalar("SELECT value FROM kb_meta WHERE key = 'index_state'")
            .fetch_optional(&pool)
            .await?;

    let model: Option<String> =
        sqlx::query_scalar("SELECT value FROM kb_meta WHERE key = 'embedding_model'")
            .fetch_optional(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path).map(|m| m.len()).unwrap_or(0);

    println!("BI Assistant — Knowledge Base Stats");
    println!("===================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Index state: {}", index_state.as_deref().unwrap_or("never built"));
    println!("  Model:       {}", model.as_deref().unwrap_or("-"));
    println!();
    println!("  Documents:   {}", total_docs);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_docs,
        if total_docs > 0 {
            (total_embedded * 100) / total_docs
        } else {
            0
        }
    );

    // Per-kind breakdown
    let kind_rows = sqlx::query(
        r#"
        SELECT slice_kind, COUNT(*) AS doc_count
        FROM summary_documents
        GROUP BY slice_kind
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !kind_rows.is_empty() {
        println!();
        println!("  By slice kind:");
        for row in kind_rows {
            let kind: String = row.get("slice_kind");
            let count: i64 = row.get("doc_count");
            println!("    {:<13} {}", kind, count);
        }
    }

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
