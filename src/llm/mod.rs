//! LLM module - reasoning backend integrations
//!
//! Provides the backend trait, the retry/backoff wrapper and the concrete
//! providers.

pub mod provider;
pub mod retry;
pub mod traits;

pub use provider::{create_backend, GeminiProvider, ScriptedBackend};
pub use retry::{RetryPolicy, RetryingBackend};
pub use traits::{BackendError, BackendReply, ReasoningBackend};
