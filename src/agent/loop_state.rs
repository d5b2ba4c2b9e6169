//! Agent loop state management
//!
//! Tracks the phase of the Reason-Act-Observe loop and the iteration budget.

use std::fmt;

use tracing::debug;

/// Phase of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    AwaitingReasoning,
    ActionRequested,
    ToolExecuted,
    FinalAnswer,
    BackendError,
    ParseFailure,
    MaxIterationsExceeded,
}

impl LoopPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoopPhase::FinalAnswer
                | LoopPhase::BackendError
                | LoopPhase::ParseFailure
                | LoopPhase::MaxIterationsExceeded
        )
    }

    /// Whether `next` may follow this phase
    pub fn allows(self, next: LoopPhase) -> bool {
        use LoopPhase::*;

        match self {
            AwaitingReasoning => matches!(
                next,
                ActionRequested | FinalAnswer | BackendError | ParseFailure | MaxIterationsExceeded
            ),
            ActionRequested => next == ToolExecuted,
            ToolExecuted => next == AwaitingReasoning,
            FinalAnswer | BackendError | ParseFailure | MaxIterationsExceeded => false,
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of the agent reasoning loop
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Iterations started so far
    pub iteration: usize,
    /// Maximum allowed iterations
    pub max_iterations: usize,
    /// Tools dispatched so far, failed ones included
    pub tool_calls: usize,
    phase: LoopPhase,
}

impl AgentLoopState {
    /// Create a new loop state with the given iteration budget
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            tool_calls: 0,
            phase: LoopPhase::AwaitingReasoning,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Check if another iteration may start
    pub fn should_continue(&self) -> bool {
        self.phase == LoopPhase::AwaitingReasoning && self.iteration < self.max_iterations
    }

    /// Start the next iteration and return its 1-based number
    pub fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    /// Move to `next`
    pub fn advance(&mut self, next: LoopPhase) {
        debug_assert!(
            self.phase.allows(next),
            "illegal loop transition {} -> {}",
            self.phase,
            next
        );
        debug!(from = %self.phase, to = %next, iteration = self.iteration, "Loop transition");
        if next == LoopPhase::ToolExecuted {
            self.tool_calls += 1;
        }
        self.phase = next;
    }
}
