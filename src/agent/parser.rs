//! Output parser
//!
//! Classifies one backend reply as an intermediate step, a final plan or a
//! failure. Never panics and never returns `Err`: every outcome is a
//! `ParsedResponse` variant.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::FinalPlan;
use crate::llm::{BackendError, BackendReply};

/// Sentinel that starts a terminal answer in free text
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Thought text only counts when an `Action:` follows it
static THOUGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Thought:(.*?)Action:").expect("thought pattern is valid"));

/// Reasoning text plus the requested action
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThoughtAction {
    /// Empty unless the reply has both `Thought:` and `Action:`
    pub thought: String,
    /// Empty when the reply named no action
    pub action: String,
}

/// Classification of one backend reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Step(ThoughtAction),
    Final(FinalPlan),
    /// A final answer was present but did not decode to a valid plan
    ParseFailure(String),
    /// The backend client gave up; nothing was parsed
    BackendFailure(BackendError),
}

/// Parse whatever the backend client returned
pub fn parse_reply(reply: Result<BackendReply, BackendError>) -> ParsedResponse {
    match reply {
        Err(err) => ParsedResponse::BackendFailure(err),
        Ok(BackendReply::Text(text)) => parse_text(&text),
        Ok(BackendReply::Structured(value)) => parse_structured(value),
    }
}

/// Marker-based parsing of free text
pub fn parse_text(text: &str) -> ParsedResponse {
    if let Some(idx) = text.find(FINAL_ANSWER_MARKER) {
        let payload = &text[idx + FINAL_ANSWER_MARKER.len()..];
        return match extract_json(payload) {
            Some(value) => decode_plan(value),
            None => ParsedResponse::ParseFailure(
                "final answer does not contain a JSON object".to_string(),
            ),
        };
    }

    let thought = THOUGHT
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    let action = text
        .find("Action:")
        .map(|idx| text[idx + "Action:".len()..].trim().to_string())
        .unwrap_or_default();

    ParsedResponse::Step(ThoughtAction { thought, action })
}

/// Decode a schema-constrained reply: `{thought, action}` or `{thought, final_answer}`
pub fn parse_structured(value: Value) -> ParsedResponse {
    let map = match value {
        Value::Object(map) => map,
        Value::String(text) => return parse_text(&text),
        other => {
            return ParsedResponse::ParseFailure(format!("unsupported response type: {other}"))
        }
    };

    match map.get("final_answer") {
        Some(Value::String(text)) => {
            return match extract_json(text) {
                Some(plan) => decode_plan(plan),
                None => ParsedResponse::ParseFailure(
                    "final_answer does not contain a JSON object".to_string(),
                ),
            }
        }
        Some(Value::Null) | None => {}
        Some(plan) => return decode_plan(plan.clone()),
    }

    // Some models return the bare plan
    if map.contains_key("recommended_actions") {
        return decode_plan(Value::Object(map));
    }

    let field = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    ParsedResponse::Step(ThoughtAction {
        thought: field("thought"),
        action: field("action"),
    })
}

fn decode_plan(value: Value) -> ParsedResponse {
    match serde_json::from_value::<FinalPlan>(value) {
        Ok(plan) if plan.has_valid_score() => ParsedResponse::Final(plan),
        Ok(plan) => ParsedResponse::ParseFailure(format!(
            "readmission_risk_score {} is outside [0, 1]",
            plan.readmission_risk_score
        )),
        Err(e) => ParsedResponse::ParseFailure(format!("final answer is not a valid plan: {e}")),
    }
}

/// Strip optional code fences, then decode; fall back to the outermost braces
fn extract_json(content: &str) -> Option<Value> {
    let trimmed = strip_fences(content.trim());

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }

    None
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line
    let rest = match rest.find('\n') {
        Some(nl) if !rest[..nl].contains('{') => &rest[nl + 1..],
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
