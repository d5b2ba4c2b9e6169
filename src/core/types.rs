//! Shared types used across VertexCare modules
//!
//! Contains the patient key, the terminal intervention plan and the loop outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer key identifying the patient a run is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub i64);

impl PatientId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(PatientId)
    }
}

impl From<i64> for PatientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Urgency of a recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// One entry of a plan's action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub priority: Priority,
    pub action: String,
}

impl RecommendedAction {
    pub fn new(priority: Priority, action: impl Into<String>) -> Self {
        Self {
            priority,
            action: action.into(),
        }
    }
}

/// Terminal output of a successful run.
///
/// Built once from the backend's final answer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPlan {
    pub patient_id: PatientId,
    /// Probability of readmission in [0, 1]
    #[serde(alias = "risk_score")]
    pub readmission_risk_score: f64,
    /// One sentence explaining the risk
    pub risk_summary: String,
    /// Ordered, most important first
    pub recommended_actions: Vec<RecommendedAction>,
}

impl FinalPlan {
    /// Whether the risk score lies inside the unit interval
    pub fn has_valid_score(&self) -> bool {
        self.readmission_risk_score.is_finite() && (0.0..=1.0).contains(&self.readmission_risk_score)
    }

    /// Actions with the given priority, in plan order
    pub fn actions_with(&self, priority: Priority) -> impl Iterator<Item = &RecommendedAction> {
        self.recommended_actions
            .iter()
            .filter(move |a| a.priority == priority)
    }
}

/// Why a run ended without a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureKind {
    /// The reasoning backend could not produce a response
    #[default]
    Backend,
    /// A final answer was produced but could not be decoded
    ParseFailure,
    /// The iteration budget ran out
    MaxIterations,
}

/// Structured error returned to the caller of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub error: String,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl RunFailure {
    pub fn new(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}

/// Result of one agent run: exactly one of these per invocation.
///
/// Serializes to the plan itself or to `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopOutcome {
    Plan(FinalPlan),
    Error(RunFailure),
}

impl LoopOutcome {
    pub fn is_plan(&self) -> bool {
        matches!(self, LoopOutcome::Plan(_))
    }

    pub fn plan(&self) -> Option<&FinalPlan> {
        match self {
            LoopOutcome::Plan(plan) => Some(plan),
            LoopOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RunFailure> {
        match self {
            LoopOutcome::Plan(_) => None,
            LoopOutcome::Error(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<FinalPlan, RunFailure> {
        match self {
            LoopOutcome::Plan(plan) => Ok(plan),
            LoopOutcome::Error(failure) => Err(failure),
        }
    }
}

/// The fixed set of tools the loop may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolName {
    Prediction,
    Explanation,
    Notes,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [ToolName::Prediction, ToolName::Explanation, ToolName::Notes];

    /// Registry name
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Prediction => "prediction",
            ToolName::Explanation => "explanation",
            ToolName::Notes => "notes",
        }
    }

    /// Name the backend is told to call
    pub fn call_name(self) -> &'static str {
        match self {
            ToolName::Prediction => "prediction_tool",
            ToolName::Explanation => "explanation_tool",
            ToolName::Notes => "notes_tool",
        }
    }

    /// The single argument every tool takes
    pub fn parameter(self) -> &'static str {
        "patient_id"
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::Prediction => "Readmission risk score between 0 and 1",
            ToolName::Explanation => "Top three features driving the risk score",
            ToolName::Notes => "Latest Community Health Worker notes",
        }
    }

    /// Signature line used in the instructions, e.g. `prediction_tool(patient_id: int)`
    pub fn signature(self) -> String {
        format!("{}({}: int)", self.call_name(), self.parameter())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.call_name())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let base = name.strip_suffix("_tool").unwrap_or(name);
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == base)
            .ok_or_else(|| name.to_string())
    }
}

/// Tool-specific fields of a successful invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Prediction { readmission_risk_score: f64 },
    Explanation { top_risk_factors: Vec<String> },
    Notes { notes: String },
}

/// Result of executing a tool.
///
/// Failures are data: they become observations, never errors of the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success {
        tool: ToolName,
        patient_id: PatientId,
        payload: ToolPayload,
    },
    Error {
        patient_id: Option<PatientId>,
        message: String,
    },
}

impl ToolResult {
    pub fn success(tool: ToolName, patient_id: PatientId, payload: ToolPayload) -> Self {
        Self::Success {
            tool,
            patient_id,
            payload,
        }
    }

    pub fn failure(patient_id: Option<PatientId>, message: impl Into<String>) -> Self {
        Self::Error {
            patient_id,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// Wire form: `{patient_id, <payload fields>, status}` or `{patient_id, error, status}`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            ToolResult::Success {
                patient_id,
                payload,
                ..
            } => {
                let mut value = match payload {
                    ToolPayload::Prediction {
                        readmission_risk_score,
                    } => json!({ "readmission_risk_score": readmission_risk_score }),
                    ToolPayload::Explanation { top_risk_factors } => {
                        json!({ "top_risk_factors": top_risk_factors })
                    }
                    ToolPayload::Notes { notes } => json!({ "notes": notes }),
                };
                value["patient_id"] = json!(patient_id);
                value["status"] = json!("Success");
                value
            }
            ToolResult::Error {
                patient_id,
                message,
            } => {
                let mut value = json!({ "error": message, "status": "Error" });
                if let Some(id) = patient_id {
                    value["patient_id"] = json!(id);
                }
                value
            }
        }
    }

    /// Transcript line for this result
    pub fn observation(&self) -> String {
        format!("Observation: {}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> FinalPlan {
        FinalPlan {
            patient_id: PatientId(2),
            readmission_risk_score: 0.45,
            risk_summary: "Patient is at risk due to a transportation barrier.".to_string(),
            recommended_actions: vec![
                RecommendedAction::new(Priority::High, "Arrange medical transport immediately."),
                RecommendedAction::new(Priority::Low, "Schedule a 30-day follow-up call."),
            ],
        }
    }

    #[test]
    fn test_plan_round_trip() {
        let plan = sample_plan();
        let json = serde_json::to_string(&plan).unwrap();
        let decoded: FinalPlan = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.patient_id, plan.patient_id);
        assert!((decoded.readmission_risk_score - plan.readmission_risk_score).abs() < 1e-6);
        assert_eq!(decoded.risk_summary, plan.risk_summary);
        assert_eq!(decoded.recommended_actions, plan.recommended_actions);
    }

    #[test]
    fn test_plan_accepts_legacy_score_key() {
        let json = r#"{
            "patient_id": 3,
            "risk_score": 0.15,
            "risk_summary": "Low risk.",
            "recommended_actions": [{"action": "Call", "priority": "Low"}]
        }"#;
        let plan: FinalPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.patient_id, PatientId(3));
        assert_eq!(plan.readmission_risk_score, 0.15);
        assert_eq!(plan.recommended_actions[0].priority, Priority::Low);
    }

    #[test]
    fn test_score_range() {
        let mut plan = sample_plan();
        assert!(plan.has_valid_score());
        plan.readmission_risk_score = 1.4;
        assert!(!plan.has_valid_score());
        plan.readmission_risk_score = f64::NAN;
        assert!(!plan.has_valid_score());
    }

    #[test]
    fn test_outcome_error_shape() {
        let outcome = LoopOutcome::Error(RunFailure::new(
            FailureKind::MaxIterations,
            "Agent failed to complete.",
        ));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, serde_json::json!({"error": "Agent failed to complete."}));
    }

    #[test]
    fn test_outcome_plan_shape() {
        let outcome = LoopOutcome::Plan(sample_plan());
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["patient_id"], 2);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_patient_id_parse() {
        assert_eq!(" 42 ".parse::<PatientId>().unwrap(), PatientId(42));
        assert!("abc".parse::<PatientId>().is_err());
    }

    #[test]
    fn test_tool_name_parse() {
        assert_eq!("prediction".parse::<ToolName>().unwrap(), ToolName::Prediction);
        assert_eq!("notes_tool".parse::<ToolName>().unwrap(), ToolName::Notes);
        assert_eq!(" explanation_tool ".parse::<ToolName>().unwrap(), ToolName::Explanation);
        assert!("weather_tool".parse::<ToolName>().is_err());
    }

    #[test]
    fn test_tool_result_json() {
        let ok = ToolResult::success(
            ToolName::Prediction,
            PatientId(2),
            ToolPayload::Prediction {
                readmission_risk_score: 0.45,
            },
        );
        assert_eq!(
            ok.to_json(),
            serde_json::json!({"patient_id": 2, "readmission_risk_score": 0.45, "status": "Success"})
        );

        let err = ToolResult::failure(Some(PatientId(9)), "Patient with ID 9 not found.");
        let value = err.to_json();
        assert_eq!(value["status"], "Error");
        assert_eq!(value["error"], "Patient with ID 9 not found.");
        assert!(err.observation().starts_with("Observation: {"));
    }
}
