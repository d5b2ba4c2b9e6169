//! Retry with exponential backoff around a reasoning backend
//!
//! Rate limits and unknown failures are retried, waiting the current delay
//! and doubling it each time, until the attempt budget is spent. Safety
//! blocks are returned immediately. The wait is `tokio::time::sleep`, so a
//! run in backoff never holds up other runs on the same runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::core::AgentConfig;
use crate::llm::traits::{BackendError, BackendReply, ReasoningBackend};

/// Attempt budget and first delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, first one included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_attempts, config.initial_backoff())
    }
}

/// Backend decorator applying a `RetryPolicy`
pub struct RetryingBackend {
    inner: Arc<dyn ReasoningBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn ReasoningBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl ReasoningBackend for RetryingBackend {
    async fn generate(&self, prompt: &str) -> Result<BackendReply, BackendError> {
        let mut delay = self.policy.initial_backoff;
        let mut attempt = 1;

        loop {
            let err = match self.inner.generate(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(backend = self.inner.name(), error = %err, "Backend call is not retryable");
                return Err(err);
            }

            if attempt >= self.policy.max_attempts {
                error!(
                    backend = self.inner.name(),
                    attempts = attempt,
                    error = %err,
                    "Backend retry budget exhausted"
                );
                return Err(BackendError::RetriesExhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            warn!(
                backend = self.inner.name(),
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Backend call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
            attempt += 1;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed sequence of results and counts calls
    struct Sequence {
        replies: Mutex<VecDeque<Result<BackendReply, BackendError>>>,
        calls: Mutex<u32>,
    }

    impl Sequence {
        fn new(replies: Vec<Result<BackendReply, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningBackend for Sequence {
        async fn generate(&self, _prompt: &str) -> Result<BackendReply, BackendError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::failed("script exhausted")))
        }

        fn name(&self) -> &str {
            "sequence"
        }
    }

    fn text(s: &str) -> Result<BackendReply, BackendError> {
        Ok(BackendReply::Text(s.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_with_doubling_delay() {
        let inner = Sequence::new(vec![
            Err(BackendError::rate_limited("429")),
            Err(BackendError::rate_limited("429")),
            text("Thought: ok"),
        ]);
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let start = Instant::now();
        let reply = backend.generate("prompt").await;

        assert_eq!(reply, text("Thought: ok"));
        assert_eq!(inner.calls(), 3);
        // 5s then 10s
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_error_value() {
        let inner = Sequence::new(vec![
            Err(BackendError::failed("500")),
            Err(BackendError::failed("502")),
            Err(BackendError::failed("503")),
            text("never reached"),
        ]);
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let err = backend.generate("prompt").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::RetriesExhausted {
                attempts: 3,
                last: "Reasoning backend call failed: 503".to_string()
            }
        );
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_block_is_not_retried() {
        let inner = Sequence::new(vec![
            Err(BackendError::safety_blocked("SAFETY")),
            text("never reached"),
        ]);
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let start = Instant::now();
        let err = backend.generate("prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::SafetyBlocked(_)));
        assert_eq!(inner.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let inner = Sequence::new(vec![Err(BackendError::rate_limited("429"))]);
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::new(1, Duration::from_secs(5)));

        let result = backend.generate("prompt").await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, BackendError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn test_policy_never_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
