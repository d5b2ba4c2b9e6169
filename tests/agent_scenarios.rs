//! Agent scenario tests
//!
//! Runs the full loop against stub tools serving five synthetic patients and
//! against scripted or failing backends.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use vertexcare::agent::{Agent, INCOMPLETE_MESSAGE};
use vertexcare::core::{
    AgentConfig, Config, FailureKind, LoopOutcome, PatientId, Priority, ProviderType, ToolError,
    ToolName, ToolPayload,
};
use vertexcare::llm::{BackendError, BackendReply, ReasoningBackend, ScriptedBackend};
use vertexcare::tools::{PatientTool, ToolContext, ToolRegistry};

/// (id, risk score, top factors, notes)
const SYNTHETIC_PATIENTS: [(i64, f64, [&str; 3], &str); 5] = [
    (
        1,
        0.75,
        ["age", "sumcomorbidities", "diabetes"],
        "Patient seems to be managing well at home.",
    ),
    (
        2,
        0.45,
        ["hypertension", "llm_transportation_issue", "age"],
        "Patient is worried about getting a ride to their cardiology appointment next week.",
    ),
    (
        3,
        0.15,
        ["race_black", "sdoh_pcp_1_0", "age"],
        "Patient in good spirits. Reports taking all medications as prescribed.",
    ),
    (
        4,
        0.65,
        ["age", "llm_financial_concern", "hypertension"],
        "Patient mentioned having trouble affording their co-pays for new prescriptions.",
    ),
    (
        5,
        0.85,
        ["sumcomorbidities", "llm_transportation_issue", "llm_financial_concern"],
        "Patient needs a ride to their appointment and also needs to be enrolled in the food assistance program.",
    ),
];

/// Serves `SYNTHETIC_PATIENTS` for one tool and counts invocations
struct StubTool {
    tool: ToolName,
    calls: Arc<AtomicUsize>,
}

impl PatientTool for StubTool {
    fn name(&self) -> ToolName {
        self.tool
    }

    fn invoke(&self, patient_id: PatientId, _ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (_, risk, factors, notes) = SYNTHETIC_PATIENTS
            .iter()
            .find(|(id, ..)| *id == patient_id.value())
            .ok_or(ToolError::PatientNotFound(patient_id))?;

        Ok(match self.tool {
            ToolName::Prediction => ToolPayload::Prediction {
                readmission_risk_score: *risk,
            },
            ToolName::Explanation => ToolPayload::Explanation {
                top_risk_factors: factors.iter().map(|f| f.to_string()).collect(),
            },
            ToolName::Notes => ToolPayload::Notes {
                notes: notes.to_string(),
            },
        })
    }
}

fn stub_registry(calls: &Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::empty(Arc::new(ToolContext::default()));
    for tool in ToolName::ALL {
        registry.register(Arc::new(StubTool {
            tool,
            calls: calls.clone(),
        }));
    }
    Arc::new(registry)
}

fn config(max_iterations: usize) -> AgentConfig {
    AgentConfig {
        max_iterations,
        max_attempts: 3,
        initial_backoff_secs: 5,
        debug: false,
        system_prompt: None,
    }
}

fn scripted_agent() -> (Agent, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(Arc::new(ScriptedBackend::new()), stub_registry(&calls), &config(5));
    (agent, calls)
}

/// Replays fixed replies in order, then repeats the last one
struct Replay {
    replies: Mutex<VecDeque<Result<BackendReply, BackendError>>>,
    last: Mutex<Option<Result<BackendReply, BackendError>>>,
    calls: AtomicUsize,
}

impl Replay {
    fn new(replies: Vec<Result<BackendReply, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningBackend for Replay {
    async fn generate(&self, _prompt: &str) -> Result<BackendReply, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(BackendError::failed("nothing to replay")))
    }

    fn name(&self) -> &str {
        "replay"
    }
}

fn text(s: &str) -> Result<BackendReply, BackendError> {
    Ok(BackendReply::Text(s.to_string()))
}

const PLAN_TWO: &str = r#"Thought: done
Final Answer: ```json
{"patient_id": 2, "readmission_risk_score": 0.45, "risk_summary": "Transport barrier.", "recommended_actions": [{"priority": "High", "action": "Arrange medical transport immediately."}]}
```"#;

#[tokio::test]
async fn test_patient_two_gets_transport_action() {
    let (agent, calls) = scripted_agent();
    let plan = agent.run(PatientId(2)).await.into_result().expect("plan");

    assert_eq!(plan.patient_id, PatientId(2));
    assert!((plan.readmission_risk_score - 0.45).abs() < 1e-6);
    assert!(plan
        .actions_with(Priority::High)
        .any(|a| a.action.to_lowercase().contains("transport")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_patient_three_gets_single_low_follow_up() {
    let (agent, _) = scripted_agent();
    let plan = agent.run(PatientId(3)).await.into_result().expect("plan");

    assert_eq!(plan.recommended_actions.len(), 1);
    assert_eq!(plan.recommended_actions[0].priority, Priority::Low);
    assert!(plan.recommended_actions[0].action.contains("follow-up"));
}

#[tokio::test]
async fn test_every_synthetic_patient_gets_expected_plan() {
    let expected = [
        (1, "Schedule a home visit to review medication adherence."),
        (2, "Arrange medical transport immediately."),
        (3, "Schedule a standard 30-day follow-up call."),
        (4, "Refer patient to social work for financial assistance programs."),
        (5, "Arrange medical transport immediately."),
    ];

    let (agent, _) = scripted_agent();
    for (id, action) in expected {
        let plan = agent.run(PatientId(id)).await.into_result().expect("plan");
        assert_eq!(plan.recommended_actions[0].action, action, "patient {id}");
    }
}

#[tokio::test]
async fn test_concurrent_runs_share_one_agent() {
    let (agent, calls) = scripted_agent();
    let agent = Arc::new(agent);

    let (a, b, c) = tokio::join!(
        agent.run(PatientId(1)),
        agent.run(PatientId(4)),
        agent.run(PatientId(5)),
    );
    for (outcome, id) in [(a, 1), (b, 4), (c, 5)] {
        assert_eq!(outcome.plan().expect("plan").patient_id, PatientId(id));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn test_unregistered_tool_continues_loop() {
    let backend = Replay::new(vec![
        text("Thought: let me check the weather\nAction: weather_tool(patient_id=2)"),
        text(PLAN_TWO),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let (outcome, transcript) = agent.run_traced(PatientId(2)).await;

    assert!(outcome.is_plan());
    assert_eq!(backend.calls(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let observation = transcript.observations().next().expect("observation");
    assert!(observation.contains("\"error\""));
    assert!(observation.contains("Failed to execute tool"));
}

#[tokio::test]
async fn test_backend_error_stops_immediately() {
    let backend = Replay::new(vec![Err(BackendError::safety_blocked("finish reason SAFETY"))]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let outcome = agent.run(PatientId(2)).await;

    let failure = outcome.error().expect("error");
    assert_eq!(failure.kind, FailureKind::Backend);
    assert!(failure.error.contains("safety filter"));
    assert_eq!(backend.calls(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_error_mid_run_stops_without_more_tool_calls() {
    let backend = Replay::new(vec![
        text("Thought: baseline\nAction: prediction_tool(patient_id=2)"),
        Err(BackendError::safety_blocked("SAFETY")),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let outcome = agent.run(PatientId(2)).await;

    assert!(!outcome.is_plan());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_no_final_answer_within_budget() {
    let backend = Replay::new(vec![text(
        "Thought: I keep checking.\nAction: notes_tool(patient_id=2)",
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let outcome = agent.run(PatientId(2)).await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({"error": INCOMPLETE_MESSAGE})
    );
    assert_eq!(backend.calls(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_unknown_patient_never_completes() {
    let (agent, _) = scripted_agent();
    let (outcome, transcript) = agent.run_traced(PatientId(99)).await;

    assert_eq!(outcome.error().expect("error").error, "Agent failed to complete.");
    assert!(transcript
        .observations()
        .all(|o| o.contains("Patient with ID 99 not found.")));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_retried_after_backoff() {
    let backend = Replay::new(vec![
        Err(BackendError::rate_limited("HTTP 429")),
        text(PLAN_TWO),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let start = Instant::now();
    let outcome = agent.run(PatientId(2)).await;

    assert!(outcome.is_plan());
    assert_eq!(backend.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_become_error_value() {
    let backend = Replay::new(vec![Err(BackendError::failed("HTTP 503"))]);
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new(backend.clone(), stub_registry(&calls), &config(5));

    let start = Instant::now();
    let outcome = agent.run(PatientId(2)).await;

    let failure = outcome.error().expect("error");
    assert!(failure.error.contains("after 3 attempts"));
    assert_eq!(backend.calls(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_does_not_stall_other_runs() {
    let slow = Replay::new(vec![
        Err(BackendError::rate_limited("HTTP 429")),
        Err(BackendError::rate_limited("HTTP 429")),
        text(PLAN_TWO),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let slow_agent = Agent::new(slow, stub_registry(&calls), &config(5));
    let (fast_agent, _) = scripted_agent();

    let start = Instant::now();
    let fast = async {
        let outcome = fast_agent.run(PatientId(3)).await;
        (outcome, start.elapsed())
    };
    let ((fast_outcome, fast_elapsed), slow_outcome) = tokio::join!(fast, slow_agent.run(PatientId(2)));

    assert!(fast_outcome.is_plan());
    assert_eq!(fast_elapsed, Duration::ZERO);
    assert!(slow_outcome.is_plan());
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test]
async fn test_bundled_artifacts_drive_full_run() {
    let mut config = Config::default();
    config.backend.provider = ProviderType::Scripted;
    config.backend.structured_output = false;
    config.artifacts.root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts");
    config.agent.system_prompt = None;

    let agent = Agent::from_config(&config).expect("artifacts load");
    assert_eq!(agent.tools().context().patients.len(), 5);

    match agent.run(PatientId(2)).await {
        LoopOutcome::Plan(plan) => {
            assert!(plan.has_valid_score());
            assert_eq!(plan.recommended_actions[0].action, "Arrange medical transport immediately.");
        }
        LoopOutcome::Error(failure) => panic!("run failed: {}", failure.error),
    }
}
