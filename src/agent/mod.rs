//! Agent module - the Reason-Act-Observe loop
//!
//! Contains the transcript, the output parser, the loop state machine and the
//! orchestrator that ties them to the backend and the tools.

pub mod loop_state;
pub mod orchestrator;
pub mod parser;
pub mod transcript;

pub use loop_state::{AgentLoopState, LoopPhase};
pub use orchestrator::{default_instructions, Agent, INCOMPLETE_MESSAGE, PARSE_FAILURE_MESSAGE};
pub use parser::{parse_reply, ParsedResponse, ThoughtAction, FINAL_ANSWER_MARKER};
pub use transcript::{SegmentKind, Transcript};
