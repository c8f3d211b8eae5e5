//! The `index` command: embed summary documents into the vector store.
//!
//! Reads the documents JSON written by `summarize`, marks the index as
//! building, replaces all rows wholesale, embeds narratives in batches,
//! and flips the index to ready only after every document has a vector.
//! A crash mid-run leaves the building marker in place, so serving
//! commands refuse the partial index instead of answering from it.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder, OpenAiEmbedder};
use crate::migrate::{INDEX_STATE_BUILDING, INDEX_STATE_READY};
use crate::models::SummaryDocument;

pub async fn run_index(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let documents = read_documents(config)?;
    if documents.is_empty() {
        bail!(
            "{} contains no documents. Run `bia summarize` first.",
            config.dataset.documents_path.display()
        );
    }

    let embedder = OpenAiEmbedder::from_config(&config.embedding)?;
    crate::migrate::run_migrations(config).await?;
    let pool = db::connect(config).await?;

    set_meta(&pool, "index_state", INDEX_STATE_BUILDING).await?;
    sqlx::query("DELETE FROM document_vectors")
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM summary_documents")
        .execute(&pool)
        .await?;

    let now = chrono::Utc::now().timestamp();
    for doc in &documents {
        sqlx::query(
            r#"
            INSERT INTO summary_documents (id, slice_kind, slice_value, narrative, chart_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(doc.slice.kind.as_str())
        .bind(&doc.slice.value)
        .bind(&doc.narrative)
        .bind(&doc.chart_id)
        .bind(now)
        .execute(&pool)
        .await?;
    }

    let mut embedded = 0usize;
    for batch in documents.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|d| d.narrative.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        for (doc, vec) in batch.iter().zip(vectors.iter()) {
            let blob = embedding::vec_to_blob(vec);
            sqlx::query(
                "INSERT INTO document_vectors (doc_id, embedding) VALUES (?, ?)",
            )
            .bind(&doc.id)
            .bind(&blob)
            .execute(&pool)
            .await?;
            embedded += 1;
        }
    }

    set_meta(&pool, "embedding_model", embedder.model()).await?;
    set_meta(&pool, "embedding_dims", &embedder.dims().to_string()).await?;
    set_meta(&pool, "index_state", INDEX_STATE_READY).await?;

    println!("index");
    println!("  documents: {}", documents.len());
    println!("  embedded:  {}", embedded);
    println!("  model:     {} ({} dims)", embedder.model(), embedder.dims());

    pool.close().await;
    Ok(())
}

fn read_documents(config: &Config) -> Result<Vec<SummaryDocument>> {
    let path = &config.dataset.documents_path;
    let json = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read {}. Run `bia summarize` first.",
            path.display()
        )
    })?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

async fn set_meta(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO kb_meta (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
