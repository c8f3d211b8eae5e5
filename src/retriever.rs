//! Similarity retrieval over the persisted document index.
//!
//! The whole index is loaded into memory once at process start and
//! shared read-only for the lifetime of the session — it is small (one
//! entry per statistical slice) and never mutated after a build.
//! Loading refuses anything that is not a complete, compatible index:
//! a missing database, an interrupted build, zero entries, or an index
//! built with a different embedding model or dimensionality all fail
//! closed with [`PipelineError::IndexUnavailable`].

use sqlx::{Row, SqlitePool};
use std::num::NonZeroUsize;

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::PipelineError;
use crate::migrate::INDEX_STATE_READY;
use crate::models::{ScoredDocument, SliceKey, SliceKind, SummaryDocument};

/// One loaded index entry: the summary document plus its embedding.
#[derive(Debug)]
struct IndexEntry {
    document: SummaryDocument,
    embedding: Vec<f32>,
}

/// The in-memory document index, loaded wholesale at startup.
#[derive(Debug)]
pub struct Index {
    entries: Vec<IndexEntry>,
    model: String,
    dims: usize,
}

async fn meta_value(pool: &SqlitePool, key: &str) -> Result<Option<String>, PipelineError> {
    sqlx::query_scalar("SELECT value FROM kb_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| PipelineError::index_unavailable(format!("cannot read index metadata: {}", e)))
}

impl Index {
    /// Load the full index from the knowledge base.
    pub async fn load(pool: &SqlitePool, config: &Config) -> Result<Index, PipelineError> {
        let state = meta_value(pool, "index_state").await?;
        match state.as_deref() {
            Some(INDEX_STATE_READY) => {}
            Some(other) => {
                return Err(PipelineError::index_unavailable(format!(
                    "index build state is '{}'; rerun `bia index`",
                    other
                )))
            }
            None => {
                return Err(PipelineError::index_unavailable(
                    "index has not been built; run `bia index`",
                ))
            }
        }

        let model = meta_value(pool, "embedding_model")
            .await?
            .ok_or_else(|| PipelineError::index_unavailable("index metadata missing model"))?;
        let dims: usize = meta_value(pool, "embedding_dims")
            .await?
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| PipelineError::index_unavailable("index metadata missing dims"))?;

        // Embedding-space compatibility is a hard invariant: a mismatch
        // would silently degrade relevance, so refuse to serve.
        if let Some(configured) = config.embedding.model.as_deref() {
            if configured != model {
                return Err(PipelineError::index_unavailable(format!(
                    "index was built with embedding model '{}' but config uses '{}'; \
                     rerun `bia index`",
                    model, configured
                )));
            }
        }
        if let Some(configured_dims) = config.embedding.dims {
            if configured_dims != dims {
                return Err(PipelineError::index_unavailable(format!(
                    "index dimensionality {} does not match configured {}; rerun `bia index`",
                    dims, configured_dims
                )));
            }
        }

        // rowid order preserves build insertion order, which is the
        // documented tie-break for equal similarity scores.
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.slice_kind, d.slice_value, d.narrative, d.chart_id, v.embedding
            FROM summary_documents d
            JOIN document_vectors v ON v.doc_id = d.id
            ORDER BY d.rowid
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(|e| PipelineError::index_unavailable(format!("cannot read index: {}", e)))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_str: String = row.get("slice_kind");
            let kind = SliceKind::parse(&kind_str).ok_or_else(|| {
                PipelineError::index_unavailable(format!("unknown slice kind '{}'", kind_str))
            })?;

            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            if vector.len() != dims {
                return Err(PipelineError::index_unavailable(format!(
                    "corrupt embedding for document '{}': {} dims, expected {}",
                    row.get::<String, _>("id"),
                    vector.len(),
                    dims
                )));
            }

            entries.push(IndexEntry {
                document: SummaryDocument {
                    id: row.get("id"),
                    slice: SliceKey::new(kind, row.get::<String, _>("slice_value")),
                    narrative: row.get("narrative"),
                    chart_id: row.get("chart_id"),
                },
                embedding: vector,
            });
        }

        if entries.is_empty() {
            return Err(PipelineError::index_unavailable("index contains no documents"));
        }

        Ok(Index {
            entries,
            model,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return the `k` most similar summary documents for a query,
    /// ordered by decreasing similarity. Ties keep index insertion
    /// order (the sort is stable). Read-only.
    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: NonZeroUsize,
    ) -> Result<Vec<ScoredDocument>, PipelineError> {
        let query_vec = embedder.embed(query).await?;
        Ok(self.rank(&query_vec, k))
    }

    /// Score and rank against an already-embedded query vector.
    fn rank(&self, query_vec: &[f32], k: NonZeroUsize) -> Vec<ScoredDocument> {
        let mut scored: Vec<ScoredDocument> = self
            .entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: embedding::cosine_similarity(query_vec, &entry.embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k.get());
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatasetConfig, DbConfig, EmbeddingConfig};
    use crate::migrate::{self, INDEX_STATE_BUILDING};
    use crate::models::{SliceKey, SliceKind};
    use sqlx::sqlite::SqlitePoolOptions;

    fn doc(id: &str) -> SummaryDocument {
        SummaryDocument {
            id: id.to_string(),
            slice: SliceKey::new(SliceKind::Product, id),
            narrative: format!("narrative for {}", id),
            chart_id: Some(id.to_string()),
        }
    }

    fn index_with(entries: Vec<(&str, Vec<f32>)>) -> Index {
        Index {
            entries: entries
                .into_iter()
                .map(|(id, embedding)| IndexEntry {
                    document: doc(id),
                    embedding,
                })
                .collect(),
            model: "test-model".to_string(),
            dims: 2,
        }
    }

    fn k(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn rank_orders_by_decreasing_similarity() {
        let index = index_with(vec![
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.0]),
            ("mid", vec![1.0, 1.0]),
        ]);

        let results = index.rank(&[1.0, 0.0], k(3));
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn rank_returns_at_most_k() {
        let index = index_with(vec![
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.9, 0.1]),
            ("c", vec![0.8, 0.2]),
        ]);
        assert_eq!(index.rank(&[1.0, 0.0], k(2)).len(), 2);
        assert_eq!(index.rank(&[1.0, 0.0], k(10)).len(), 3);
    }

    async fn kb_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::create_schema(&pool).await.unwrap();
        pool
    }

    async fn set_meta(pool: &SqlitePool, key: &str, value: &str) {
        sqlx::query("INSERT INTO kb_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await
            .unwrap();
    }

    fn serving_config(model: &str, dims: usize) -> Config {
        Config {
            dataset: DatasetConfig {
                csv_path: "datasets/sales_data.csv".into(),
                documents_path: "kb/documents.json".into(),
                charts_dir: "kb/charts".into(),
            },
            db: DbConfig {
                path: "kb/test.sqlite".into(),
            },
            embedding: EmbeddingConfig {
                provider: "openai".to_string(),
                model: Some(model.to_string()),
                dims: Some(dims),
                ..EmbeddingConfig::default()
            },
            generation: Default::default(),
            retrieval: Default::default(),
            evaluation: Default::default(),
        }
    }

    #[tokio::test]
    async fn load_refuses_index_left_in_building_state() {
        let pool = kb_pool().await;
        set_meta(&pool, "index_state", INDEX_STATE_BUILDING).await;
        set_meta(&pool, "embedding_model", "text-embedding-3-small").await;
        set_meta(&pool, "embedding_dims", "2").await;

        let err = Index::load(&pool, &serving_config("text-embedding-3-small", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::IndexUnavailable(_)));
        assert!(err.to_string().contains("building"), "err={}", err);
    }

    #[tokio::test]
    async fn load_refuses_mismatched_embedding_model() {
        let pool = kb_pool().await;
        set_meta(&pool, "index_state", INDEX_STATE_READY).await;
        set_meta(&pool, "embedding_model", "text-embedding-3-small").await;
        set_meta(&pool, "embedding_dims", "2").await;

        let err = Index::load(&pool, &serving_config("text-embedding-3-large", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::IndexUnavailable(_)));
        assert!(err.to_string().contains("embedding model"), "err={}", err);
    }

    #[tokio::test]
    async fn load_refuses_mismatched_dimensionality() {
        let pool = kb_pool().await;
        set_meta(&pool, "index_state", INDEX_STATE_READY).await;
        set_meta(&pool, "embedding_model", "text-embedding-3-small").await;
        set_meta(&pool, "embedding_dims", "2").await;

        let err = Index::load(&pool, &serving_config("text-embedding-3-small", 1536))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::IndexUnavailable(_)));
        assert!(err.to_string().contains("dimensionality"), "err={}", err);
    }

    #[tokio::test]
    async fn load_refuses_ready_index_with_no_documents() {
        let pool = kb_pool().await;
        set_meta(&pool, "index_state", INDEX_STATE_READY).await;
        set_meta(&pool, "embedding_model", "text-embedding-3-small").await;
        set_meta(&pool, "embedding_dims", "2").await;

        let err = Index::load(&pool, &serving_config("text-embedding-3-small", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::IndexUnavailable(_)));
        assert!(err.to_string().contains("no documents"), "err={}", err);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        // Same direction, same score: insertion order must survive.
        let index = index_with(vec![
            ("first", vec![2.0, 0.0]),
            ("second", vec![4.0, 0.0]),
            ("third", vec![1.0, 0.0]),
        ]);
        let results = index.rank(&[1.0, 0.0], k(3));
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
