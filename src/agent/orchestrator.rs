//! Agent orchestrator
//!
//! Drives the Reason-Act-Observe loop for one patient: ask the backend for the
//! next step, dispatch the requested tool, append reasoning and observation to
//! the transcript, repeat until a plan, a fatal error or the iteration cap.
//!
//! Tool failures never end a run; they are observations the backend can react
//! to. Backend failures and undecodable final answers end it immediately.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::agent::loop_state::{AgentLoopState, LoopPhase};
use crate::agent::parser::{parse_reply, ParsedResponse};
use crate::agent::transcript::Transcript;
use crate::core::{AgentConfig, Config, FailureKind, LoopOutcome, PatientId, Result, RunFailure};
use crate::llm::{create_backend, BackendReply, ReasoningBackend, RetryPolicy, RetryingBackend};
use crate::tools::{ToolContext, ToolRegistry};

/// Returned when a final answer is present but does not decode
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse final plan.";
/// Returned when the iteration budget runs out
pub const INCOMPLETE_MESSAGE: &str = "Agent failed to complete.";

const INSTRUCTIONS_HEADER: &str = r#"You are an expert Community Health Worker (CHW) coordinator named "Maanav".
Your mission is to analyze patient cases, determine their risk of hospital readmission,
and create a clear, prioritized, and actionable intervention plan.

You must operate in a strict Reason-Act-Observe loop. At each step, use the following format:

Thought: Your reasoning about what to do next.
Action: The tool you will use to gather information, called as tool_name(patient_id=<int>).

You can only use one of the following tools:"#;

const INSTRUCTIONS_FOOTER: &str = r#"When you have gathered enough information, reply with "Final Answer:" followed by a JSON object:
{"patient_id": <int>, "readmission_risk_score": <float between 0 and 1>, "risk_summary": "<one sentence>",
 "recommended_actions": [{"priority": "High" | "Medium" | "Low", "action": "<text>"}]}
List the most important action first."#;

/// Default instructions for the given tool set
pub fn default_instructions(tools: &ToolRegistry) -> String {
    format!(
        "{}\n{}\n\n{}",
        INSTRUCTIONS_HEADER,
        tools.describe(),
        INSTRUCTIONS_FOOTER
    )
}

/// Intervention-plan agent
///
/// Holds only shared, read-only state, so one `Agent` can serve any number of
/// concurrent runs.
pub struct Agent {
    backend: RetryingBackend,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    instructions: String,
}

impl Agent {
    /// Create an agent over an existing backend and tool registry
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        tools: Arc<ToolRegistry>,
        config: &AgentConfig,
    ) -> Self {
        let instructions = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| default_instructions(&tools));

        Self {
            backend: RetryingBackend::new(backend, RetryPolicy::from_config(config)),
            tools,
            max_iterations: config.max_iterations.max(1),
            instructions,
        }
    }

    /// Load the artifacts and build the configured backend
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let context = ToolContext::load(&config.artifacts.root)?;
        let tools = Arc::new(ToolRegistry::new(Arc::new(context)));
        let backend = create_backend(&config.backend)?;
        Ok(Self::new(backend, tools, &config.agent))
    }

    /// Run the loop for one patient
    pub async fn run(&self, patient_id: PatientId) -> LoopOutcome {
        self.run_traced(patient_id).await.0
    }

    /// Run the loop and also hand back the final transcript
    pub async fn run_traced(&self, patient_id: PatientId) -> (LoopOutcome, Transcript) {
        let mut transcript = Transcript::seeded(&self.instructions, patient_id);
        let mut state = AgentLoopState::new(self.max_iterations);

        info!(%patient_id, max_iterations = self.max_iterations, backend = self.backend.name(), "Starting agent run");

        while state.should_continue() {
            let iteration = state.begin_iteration();
            info!(%patient_id, iteration, "Iteration {}/{}", iteration, self.max_iterations);

            let reply = self.backend.generate(&transcript.render()).await;
            let reasoning = reply.as_ref().map(BackendReply::transcript_text).ok();

            match parse_reply(reply) {
                ParsedResponse::BackendFailure(err) => {
                    state.advance(LoopPhase::BackendError);
                    error!(%patient_id, iteration, error = %err, "Reasoning backend failed");
                    return (
                        LoopOutcome::Error(RunFailure::new(FailureKind::Backend, err.to_string())),
                        transcript,
                    );
                }
                ParsedResponse::ParseFailure(reason) => {
                    state.advance(LoopPhase::ParseFailure);
                    error!(%patient_id, iteration, %reason, "Final answer could not be decoded");
                    return (
                        LoopOutcome::Error(RunFailure::new(
                            FailureKind::ParseFailure,
                            PARSE_FAILURE_MESSAGE,
                        )),
                        transcript,
                    );
                }
                ParsedResponse::Final(plan) => {
                    state.advance(LoopPhase::FinalAnswer);
                    if plan.patient_id != patient_id {
                        warn!(%patient_id, plan_patient_id = %plan.patient_id, "Plan names a different patient");
                    }
                    info!(
                        %patient_id,
                        iteration,
                        tool_calls = state.tool_calls,
                        risk = plan.readmission_risk_score,
                        actions = plan.recommended_actions.len(),
                        "Final plan generated"
                    );
                    return (LoopOutcome::Plan(plan), transcript);
                }
                ParsedResponse::Step(step) => {
                    if !step.thought.is_empty() {
                        info!(%patient_id, iteration, thought = %step.thought, "Agent thought");
                    }
                    info!(%patient_id, iteration, action = %step.action, "Agent action");
                    state.advance(LoopPhase::ActionRequested);

                    let result = self.tools.dispatch(&step.action);
                    state.advance(LoopPhase::ToolExecuted);

                    let observation = result.observation();
                    info!(%patient_id, iteration, success = result.is_success(), %observation, "Agent observation");

                    transcript.record_step(reasoning.unwrap_or_default(), &result);
                    state.advance(LoopPhase::AwaitingReasoning);
                }
            }
        }

        state.advance(LoopPhase::MaxIterationsExceeded);
        warn!(%patient_id, iterations = state.iteration, tool_calls = state.tool_calls, "Iteration budget exhausted without a plan");
        (
            LoopOutcome::Error(RunFailure::new(FailureKind::MaxIterations, INCOMPLETE_MESSAGE)),
            transcript,
        )
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.backend.policy()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Change the iteration budget for subsequent runs
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations.max(1);
    }
}
