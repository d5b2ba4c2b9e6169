//! Reasoning backend trait for abstracting different providers
//!
//! Enables swapping between Gemini, Vertex AI and the offline scripted backend.

use async_trait::async_trait;
use thiserror::Error;

/// What a backend produced for one step
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// Free text following the Thought/Action/Final Answer format
    Text(String),
    /// Schema-constrained JSON from a structured-output adapter
    Structured(serde_json::Value),
}

impl BackendReply {
    /// Text appended to the transcript for this reply
    pub fn transcript_text(&self) -> String {
        match self {
            BackendReply::Text(text) => text.trim().to_string(),
            BackendReply::Structured(value) => value.to_string(),
        }
    }
}

/// Classified backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Quota or rate limit hit; worth retrying after a pause
    #[error("Reasoning backend is rate limited: {0}")]
    RateLimited(String),

    /// Output withheld by the provider's content-safety filter
    #[error("Reasoning backend response was blocked by the safety filter: {0}")]
    SafetyBlocked(String),

    /// Anything else (network, server error, malformed envelope)
    #[error("Reasoning backend call failed: {0}")]
    Failed(String),

    /// Every attempt of the retry budget failed
    #[error("Reasoning backend failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl BackendError {
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn safety_blocked(msg: impl Into<String>) -> Self {
        Self::SafetyBlocked(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Safety blocks are final; everything else may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::RateLimited(_) | BackendError::Failed(_))
    }
}

/// Trait for reasoning backends
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Produce the next step for the full transcript
    async fn generate(&self, prompt: &str) -> Result<BackendReply, BackendError>;

    /// Get the provider name
    fn name(&self) -> &str;
}
