//! Google Gemini provider
//!
//! Talks to `generateContent` either on the public Gemini API (API key) or on
//! Vertex AI (access token from `gcloud auth print-access-token`). Responses
//! are classified into rate limits, safety blocks and other failures so the
//! retry layer can decide what to do with them.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::core::{BackendConfig, Result, VertexCareError};
use crate::llm::traits::{BackendError, BackendReply, ReasoningBackend};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons that mean the content filter withheld the output
const BLOCKED_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// How requests are addressed and authenticated
#[derive(Debug, Clone)]
enum Endpoint {
    ApiKey { key: String },
    Vertex { project_id: String, location: String },
}

pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: Endpoint,
    model: String,
    structured_output: bool,
    name: &'static str,
}

impl GeminiProvider {
    /// Gemini API, key read from `api_key_env`
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env).map_err(|_| {
            VertexCareError::config(format!("{} is not set", config.api_key_env))
        })?;
        Self::build(config, Endpoint::ApiKey { key }, "gemini")
    }

    /// Vertex AI in the configured project and region
    pub fn vertex_from_config(config: &BackendConfig) -> Result<Self> {
        let project_id = config.project_id.clone().ok_or_else(|| {
            VertexCareError::config("backend.project_id (or GOOGLE_CLOUD_PROJECT) is not set")
        })?;
        let endpoint = Endpoint::Vertex {
            project_id,
            location: config.location.clone(),
        };
        Self::build(config, endpoint, "vertex")
    }

    fn build(config: &BackendConfig, endpoint: Endpoint, name: &'static str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            structured_output: config.structured_output,
            name,
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::ApiKey { .. } => {
                format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model)
            }
            Endpoint::Vertex {
                project_id,
                location,
            } => format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
                loc = location,
                project = project_id,
                model = self.model
            ),
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut generation_config = json!({ "candidateCount": 1 });
        if self.structured_output {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = step_schema();
        }

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        })
    }

    async fn access_token() -> std::result::Result<String, BackendError> {
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| BackendError::failed(format!("Failed to execute gcloud: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::failed(format!("gcloud auth failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ReasoningBackend for GeminiProvider {
    async fn generate(&self, prompt: &str) -> std::result::Result<BackendReply, BackendError> {
        let request = self.client.post(self.url()).json(&self.request_body(prompt));
        let request = match &self.endpoint {
            Endpoint::ApiKey { key } => request.header("x-goog-api-key", key),
            Endpoint::Vertex { .. } => request.bearer_auth(Self::access_token().await?),
        };

        debug!(backend = self.name, model = %self.model, chars = prompt.len(), "Sending generateContent request");

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::failed(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::failed(e.to_string()))?;

        interpret_response(status, &body, self.structured_output)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    status: Option<String>,
}

/// Classify an HTTP status and body into a reply or a `BackendError`
pub(crate) fn interpret_response(
    status: u16,
    body: &str,
    structured: bool,
) -> std::result::Result<BackendReply, BackendError> {
    if !(200..300).contains(&status) {
        let api_status = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error.status);
        if status == 429 || api_status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return Err(BackendError::rate_limited(format!("HTTP {}: {}", status, body.trim())));
        }
        return Err(BackendError::failed(format!(
            "Gemini API error {}: {}",
            status,
            body.trim()
        )));
    }

    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::failed(format!("Malformed response: {}", e)))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BackendError::safety_blocked(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::failed("Response has no candidates"))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKED_FINISH_REASONS.contains(&reason) {
            return Err(BackendError::safety_blocked(format!("finish reason {}", reason)));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(BackendError::failed("Response has no text"));
    }

    if structured {
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            return Ok(BackendReply::Structured(value));
        }
    }
    Ok(BackendReply::Text(text))
}

/// Response schema for one step: a thought plus either an action or a final answer
pub(crate) fn step_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "thought": { "type": "STRING" },
            "action": { "type": "STRING" },
            "final_answer": {
                "type": "OBJECT",
                "properties": {
                    "patient_id": { "type": "INTEGER" },
                    "readmission_risk_score": { "type": "NUMBER" },
                    "risk_summary": { "type": "STRING" },
                    "recommended_actions": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "priority": { "type": "STRING", "enum": ["High", "Medium", "Low"] },
                                "action": { "type": "STRING" }
                            },
                            "required": ["priority", "action"]
                        }
                    }
                },
                "required": ["patient_id", "readmission_risk_score", "risk_summary", "recommended_actions"]
            }
        },
        "required": ["thought"]
    })
}
