//! Embedding client and vector utilities.
//!
//! The retriever and the index builder both embed text through the
//! [`Embedder`] trait; the production implementation calls the OpenAI
//! embeddings API. Query-time and build-time embedding MUST use the
//! same model — the index records its model and dimensionality and the
//! retriever refuses to load a mismatched index, because a silent
//! embedding-space mismatch degrades relevance with no error signal.
//!
//! Retry strategy for the hosted call (shared with chat completion):
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, …,
//!   capped at 32s)
//! - other 4xx → fail immediately
//! - network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Something that can turn text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, e.g. `"text-embedding-3-small"`.
    fn model(&self) -> &str;
    /// Vector dimensionality, e.g. `1536`.
    fn dims(&self) -> usize;
    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

/// Embedding client for the OpenAI `POST /v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiEmbedder {
    /// Build a client from configuration. Requires `OPENAI_API_KEY` in
    /// the environment and `model`/`dims` in the config.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        if !config.is_enabled() {
            bail!("Embedding provider is disabled. Set [embedding] provider in config.");
        }
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            client,
            api_key,
        })
    }

    /// Embed a batch of texts, returning one vector per input in order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            PipelineError::generation_failed(format!(
                                "embedding response unreadable: {}",
                                e
                            ))
                        })?;
                        return self.parse_response(&json, texts.len());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("embeddings API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error other than rate limiting: no retry.
                    return Err(PipelineError::generation_failed(format!(
                        "embeddings API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(format!("embeddings request failed: {}", e));
                    continue;
                }
            }
        }

        Err(PipelineError::generation_failed(
            last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
        ))
    }

    fn parse_response(
        &self,
        json: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
            PipelineError::generation_failed("invalid embeddings response: missing data array")
        })?;

        if data.len() != expected {
            return Err(PipelineError::generation_failed(format!(
                "invalid embeddings response: expected {} vectors, got {}",
                expected,
                data.len()
            )));
        }

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let values = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| {
                    PipelineError::generation_failed(
                        "invalid embeddings response: missing embedding",
                    )
                })?;

            let vec: Vec<f32> = values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();

            if vec.len() != self.dims {
                return Err(PipelineError::generation_failed(format!(
                    "embedding dimensionality {} does not match configured dims {}",
                    vec.len(),
                    self.dims
                )));
            }

            vectors.push(vec);
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::generation_failed("empty embedding response"))
    }
}

/// Encode a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f32, 0.0f32, 0.0f32), |acc, (x, y)| {
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
