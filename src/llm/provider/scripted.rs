//! Scripted offline backend
//!
//! Reads the transcript and answers the way a well-behaved model would:
//! prediction, then explanation, then notes, then a plan chosen from what the
//! observations contain. Used for the CLI's default mode, demos and tests.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::core::{FinalPlan, PatientId, Priority, RecommendedAction, ToolName};
use crate::llm::traits::{BackendError, BackendReply, ReasoningBackend};

static PATIENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"patient_id: (-?\d+)").expect("patient pattern is valid"));

/// Risk below this gets a routine follow-up instead of a home visit
pub const LOW_RISK_THRESHOLD: f64 = 0.2;

const TRANSPORT_MARKER: &str = "llm_transportation_issue";
const FINANCIAL_MARKER: &str = "llm_financial_concern";

/// What the script decided for this step
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Act { thought: String, tool: ToolName },
    Finish { thought: String, plan: FinalPlan },
}

/// Deterministic backend driven by the transcript contents
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    structured: bool,
}

impl ScriptedBackend {
    /// Emits `Thought:` / `Action:` / `Final Answer:` text
    pub fn new() -> Self {
        Self { structured: false }
    }

    /// Emits `{thought, action}` / `{thought, final_answer}` objects
    pub fn structured() -> Self {
        Self { structured: true }
    }

    fn decide(prompt: &str) -> Result<(PatientId, Step), BackendError> {
        let patient_id = PATIENT
            .captures(prompt)
            .and_then(|c| c[1].parse::<i64>().ok())
            .map(PatientId)
            .ok_or_else(|| BackendError::failed("transcript does not name a patient_id"))?;

        let observations = Observations::collect(prompt);

        let step = match observations.risk_score {
            None => Step::Act {
                thought: "I need to start by understanding the patient's baseline risk. \
                          I should use the prediction_tool."
                    .to_string(),
                tool: ToolName::Prediction,
            },
            Some(score) if !observations.has_factors => Step::Act {
                thought: format!(
                    "The risk score is {}. I need to understand the reasons for this risk \
                     to create a targeted plan. I should use the explanation_tool.",
                    score
                ),
                tool: ToolName::Explanation,
            },
            Some(_) if !observations.has_notes => Step::Act {
                thought: "I have the clinical risk factors. Now I must check the CHW notes \
                          for any social or logistical barriers that might be contributing \
                          to this risk. I should use the notes_tool."
                    .to_string(),
                tool: ToolName::Notes,
            },
            Some(score) => Step::Finish {
                thought: "I have the risk score, its drivers and the latest notes, \
                          so I can write the plan."
                    .to_string(),
                plan: plan_for(patient_id, score, &observations.text),
            },
        };
        Ok((patient_id, step))
    }

    fn render(&self, patient_id: PatientId, step: Step) -> Result<BackendReply, BackendError> {
        let action = |tool: ToolName| format!("{}({}={})", tool.call_name(), tool.parameter(), patient_id);

        if self.structured {
            let value = match step {
                Step::Act { thought, tool } => json!({ "thought": thought, "action": action(tool) }),
                Step::Finish { thought, plan } => {
                    let plan = serde_json::to_value(plan).map_err(|e| BackendError::failed(e.to_string()))?;
                    json!({ "thought": thought, "final_answer": plan })
                }
            };
            return Ok(BackendReply::Structured(value));
        }

        let text = match step {
            Step::Act { thought, tool } => format!("Thought: {}\nAction: {}", thought, action(tool)),
            Step::Finish { thought, plan } => {
                let plan = serde_json::to_string_pretty(&plan)
                    .map_err(|e| BackendError::failed(e.to_string()))?;
                format!("Thought: {}\nFinal Answer:\n```json\n{}\n```", thought, plan)
            }
        };
        Ok(BackendReply::Text(text))
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<BackendReply, BackendError> {
        let (patient_id, step) = Self::decide(prompt)?;
        debug!(%patient_id, ?step, "Scripted backend decided next step");
        self.render(patient_id, step)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Successful tool observations found in the transcript
#[derive(Debug, Default)]
struct Observations {
    risk_score: Option<f64>,
    has_factors: bool,
    has_notes: bool,
    /// All observation lines, for marker lookups
    text: String,
}

impl Observations {
    fn collect(prompt: &str) -> Self {
        let mut found = Self::default();
        for line in prompt.lines() {
            let Some(raw) = line.strip_prefix("Observation: ") else {
                continue;
            };
            found.text.push_str(raw);
            found.text.push('\n');

            let Ok(value) = serde_json::from_str::<Value>(raw) else {
                continue;
            };
            if let Some(score) = value.get("readmission_risk_score").and_then(Value::as_f64) {
                found.risk_score = Some(score);
            }
            found.has_factors |= value.get("top_risk_factors").is_some();
            found.has_notes |= value.get("notes").is_some();
        }
        found
    }
}

fn plan_for(patient_id: PatientId, score: f64, observations: &str) -> FinalPlan {
    let (summary, priority, action) = if observations.contains(TRANSPORT_MARKER) {
        (
            "Patient is at risk due to a critical transportation barrier for an upcoming appointment.",
            Priority::High,
            "Arrange medical transport immediately.",
        )
    } else if observations.contains(FINANCIAL_MARKER) {
        (
            "Patient is at risk due to a financial concern regarding medication co-pays.",
            Priority::High,
            "Refer patient to social work for financial assistance programs.",
        )
    } else if score < LOW_RISK_THRESHOLD {
        (
            "Patient is at low risk and appears to be managing well.",
            Priority::Low,
            "Schedule a standard 30-day follow-up call.",
        )
    } else {
        (
            "Patient is at high risk due to advanced age and multiple comorbidities.",
            Priority::High,
            "Schedule a home visit to review medication adherence.",
        )
    };

    FinalPlan {
        patient_id,
        readmission_risk_score: score,
        risk_summary: summary.to_string(),
        recommended_actions: vec![RecommendedAction::new(priority, action)],
    }
}
