//! Tools module - patient tools and the dispatcher
//!
//! Tools are deterministic and read-only: they look at the shared
//! `ToolContext` and return a payload or a `ToolError`.

pub mod clinical;
pub mod context;
pub mod registry;

pub use context::ToolContext;
pub use registry::{ActionRequest, InvalidAction, ToolRegistry};

use crate::core::{PatientId, ToolError, ToolName, ToolPayload};

/// A tool the agent can call with a single patient id
pub trait PatientTool: Send + Sync {
    /// Registry name of the tool
    fn name(&self) -> ToolName;

    /// Run the tool for one patient
    fn invoke(&self, patient_id: PatientId, ctx: &ToolContext) -> Result<ToolPayload, ToolError>;
}
