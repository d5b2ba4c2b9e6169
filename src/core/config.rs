//! Configuration management for VertexCare
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/vertexcare/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::core::error::{Result, VertexCareError};

/// Main configuration for VertexCare
///
/// Every section and field is optional in the file; missing ones take the
/// defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Reasoning backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Model, imputer and patient data locations
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

/// Which reasoning backend drives the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Deterministic offline backend
    Scripted,
    /// Gemini API with an API key
    Gemini,
    /// Vertex AI with a gcloud access token
    Vertex,
}

impl std::str::FromStr for ProviderType {
    type Err = VertexCareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scripted" | "mock" => Ok(ProviderType::Scripted),
            "gemini" => Ok(ProviderType::Gemini),
            "vertex" | "vertexai" => Ok(ProviderType::Vertex),
            other => Err(VertexCareError::config(format!(
                "Unknown backend provider '{}'. Expected scripted, gemini or vertex",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Scripted => write!(f, "scripted"),
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::Vertex => write!(f, "vertex"),
        }
    }
}

/// Reasoning backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Provider used for reasoning
    pub provider: ProviderType,
    /// Model name (default: gemini-2.5-flash)
    pub model: String,
    /// Environment variable holding the Gemini API key
    pub api_key_env: String,
    /// Google Cloud project (Vertex only)
    pub project_id: Option<String>,
    /// Google Cloud region (Vertex only)
    pub location: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Ask the provider for schema-constrained JSON instead of free text
    pub structured_output: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: env::var("VERTEXCARE_BACKEND")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(ProviderType::Scripted),
            model: env::var("VERTEXCARE_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            api_key_env: "GEMINI_API_KEY".to_string(),
            project_id: env::var("GOOGLE_CLOUD_PROJECT").ok(),
            location: "us-central1".to_string(),
            timeout_secs: 120,
            structured_output: false,
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning iterations before giving up
    /// Default: 5
    pub max_iterations: usize,
    /// Backend attempts per iteration, first call included
    /// Default: 3
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every retry
    /// Default: 5
    pub initial_backoff_secs: u64,
    /// Whether to log at debug level
    pub debug: bool,
    /// Replaces the built-in CHW coordinator instructions
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_attempts: 3,
            initial_backoff_secs: 5,
            debug: env::var("VERTEXCARE_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }
}

/// Locations of the loaded-once dependency bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Root holding `models/` and `data/`
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: env::var("VERTEXCARE_ARTIFACTS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("artifacts")),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vertexcare")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let path = Self::config_file();
        if path.exists() {
            match Self::load_from_path(&path) {
                Ok(config) => return config,
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable config file, using defaults"
                ),
            }
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VertexCareError::config("Config file not found"));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| VertexCareError::config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| VertexCareError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_file();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to a specific file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    VertexCareError::config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| VertexCareError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| VertexCareError::config(format!("Failed to write config: {}", e)))
    }

    /// Check the values the loop relies on
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(VertexCareError::config("agent.max_iterations must be at least 1"));
        }
        if self.agent.max_attempts == 0 {
            return Err(VertexCareError::config("agent.max_attempts must be at least 1"));
        }
        if self.backend.provider == ProviderType::Vertex && self.backend.project_id.is_none() {
            return Err(VertexCareError::config(
                "backend.project_id (or GOOGLE_CLOUD_PROJECT) is required for Vertex AI",
            ));
        }
        Ok(())
    }
}
