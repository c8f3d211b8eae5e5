//! Chat completion client.
//!
//! Answer composition and evaluation judging both go through the
//! [`ChatModel`] trait; the production implementation calls the OpenAI
//! chat completions API with the same retry discipline as the
//! embedding client. A failed call surfaces as
//! [`PipelineError::GenerationFailed`] — the pipeline never invents an
//! answer when the hosted model is unreachable.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::PipelineError;

/// A hosted model that turns a system prompt plus user prompt into a
/// text completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError>;
}

/// Client for the OpenAI `POST /v1/chat/completions` endpoint.
pub struct OpenAiChat {
    model: String,
    temperature: f64,
    max_retries: u32,
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiChat {
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        if !config.is_enabled() {
            bail!("Generation provider is disabled. Set [generation] provider in config.");
        }
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client,
            api_key,
        })
    }

    /// Same client, different model name. Used for the evaluation
    /// judge when `evaluation.judge_model` is configured.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
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
                                "completion response unreadable: {}",
                                e
                            ))
                        })?;
                        return extract_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("chat API error {}: {}", status, body_text));
                        continue;
                    }

                    return Err(PipelineError::generation_failed(format!(
                        "chat API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(format!("chat request failed: {}", e));
                    continue;
                }
            }
        }

        Err(PipelineError::generation_failed(
            last_err.unwrap_or_else(|| "completion failed after retries".to_string()),
        ))
    }
}

fn extract_completion(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| {
            PipelineError::generation_failed("invalid completion response: missing message content")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Total sales were $500. " } }
            ]
        });
        assert_eq!(extract_completion(&json).unwrap(), "Total sales were $500.");
    }

    #[test]
    fn missing_content_is_generation_failure() {
        let json = serde_json::json!({ "choices": [] });
        let err = extract_completion(&json).unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailed(_)));
    }
}
