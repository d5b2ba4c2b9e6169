//! Custom error types for VertexCare
//!
//! Provides a unified error handling system across all modules.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::PatientId;

/// Main error type for VertexCare operations
#[derive(Error, Debug)]
pub enum VertexCareError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model, imputer or patient table could not be loaded
    #[error("Failed to load artifact {path}: {message}")]
    Artifact { path: PathBuf, message: String },

    /// No `*_logistic_regression` directory under the models folder
    #[error("No model directories found in {0}")]
    NoModelDirectory(PathBuf),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for VertexCare operations
pub type Result<T> = std::result::Result<T, VertexCareError>;

impl VertexCareError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an artifact loading error
    pub fn artifact(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: msg.into(),
        }
    }
}

/// Failure inside a tool; reported to the backend as an observation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Patient data is not loaded.")]
    DataNotLoaded,

    #[error("Patient with ID {0} not found.")]
    PatientNotFound(PatientId),

    #[error("Model has no coefficient for feature '{0}'")]
    MissingFeature(String),

    #[error("None of the model features are present in the patient data")]
    NoFeatures,
}
