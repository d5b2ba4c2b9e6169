//! Reasoning backend implementations and factory
//!
//! Submodules implement specific providers (Gemini API, Vertex AI, scripted).

pub mod gemini;
pub mod scripted;

use std::sync::Arc;

use tracing::info;

use crate::core::config::{BackendConfig, ProviderType};
use crate::core::Result;
use crate::llm::traits::ReasoningBackend;

pub use self::gemini::GeminiProvider;
pub use self::scripted::ScriptedBackend;

/// Create a reasoning backend based on configuration
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ReasoningBackend>> {
    let backend: Arc<dyn ReasoningBackend> = match config.provider {
        ProviderType::Scripted if config.structured_output => Arc::new(ScriptedBackend::structured()),
        ProviderType::Scripted => Arc::new(ScriptedBackend::new()),
        ProviderType::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderType::Vertex => Arc::new(GeminiProvider::vertex_from_config(config)?),
    };
    info!(
        backend = backend.name(),
        model = %config.model,
        structured = config.structured_output,
        "Reasoning backend ready"
    );
    Ok(backend)
}
