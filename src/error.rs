//! Pipeline error conditions.
//!
//! Each variant maps to one failure mode of the question-answering
//! pipeline and determines how far the failure propagates:
//!
//! - [`PipelineError::DataLoad`] — the source CSV is missing or
//!   malformed. Fatal to a `summarize` run.
//! - [`PipelineError::IndexUnavailable`] — the knowledge base is
//!   missing, partially built, or was built with an incompatible
//!   embedding model. Fatal to serving; surfaced to the user as
//!   "knowledge base unavailable".
//! - [`PipelineError::GenerationFailed`] — a hosted model call errored
//!   or timed out. Recoverable at the turn level: the user sees an
//!   error, conversation history is unaffected, and the question may
//!   be retried.
//! - [`PipelineError::JudgeFailed`] — evaluation-time only. The
//!   affected example is marked incorrect with an error note and the
//!   run continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source dataset missing or malformed.
    #[error("failed to load sales dataset: {0}")]
    DataLoad(String),

    /// Index missing, corrupt, partially written, or built with an
    /// incompatible embedding model.
    #[error("knowledge base unavailable: {0}")]
    IndexUnavailable(String),

    /// Hosted model call (embedding or chat completion) failed after
    /// retries were exhausted.
    #[error("answer generation failed: {0}")]
    GenerationFailed(String),

    /// The LLM judge call failed during evaluation.
    #[error("judge call failed: {0}")]
    JudgeFailed(String),
}

impl PipelineError {
    pub fn data_load(msg: impl Into<String>) -> Self {
        PipelineError::DataLoad(msg.into())
    }

    pub fn index_unavailable(msg: impl Into<String>) -> Self {
        PipelineError::IndexUnavailable(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        PipelineError::GenerationFailed(msg.into())
    }
}
