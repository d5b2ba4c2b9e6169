//! Core module - shared infrastructure for VertexCare
//!
//! This module contains foundational types, configuration, error handling
//! and logging setup used throughout the application.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{AgentConfig, ArtifactsConfig, BackendConfig, Config, ProviderType};
pub use error::{Result, ToolError, VertexCareError};
pub use types::*;
