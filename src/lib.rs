//! VertexCare - CHW intervention planning agent
//!
//! Generates a structured patient-intervention plan by letting a reasoning
//! backend call a readmission-risk model, a feature explainer and the care
//! notes through a bounded Reason-Act-Observe loop.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, error handling and logging
//! - **LLM**: Reasoning backend abstraction, retry/backoff, Gemini/Vertex and scripted providers
//! - **Tools**: Prediction, explanation and notes tools plus the dispatcher
//! - **Agent**: Transcript, output parser, loop state machine and orchestrator
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use vertexcare::{Agent, Config, PatientId};
//!
//! #[tokio::main]
//! async fn main() -> vertexcare::Result<()> {
//!     let agent = Agent::from_config(&Config::load())?;
//!     let outcome = agent.run(PatientId(2)).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::Agent;
pub use cli::Repl;
pub use core::{
    Config, FinalPlan, LoopOutcome, PatientId, Priority, ProviderType, RecommendedAction, Result,
    VertexCareError,
};
