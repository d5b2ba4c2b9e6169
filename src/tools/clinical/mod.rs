//! Clinical tools - risk prediction, risk explanation and CHW notes
//!
//! Each tool takes a patient id and reads the shared `ToolContext`.

pub mod explanation;
pub mod notes;
pub mod prediction;

pub use explanation::ExplanationTool;
pub use notes::NotesTool;
pub use prediction::PredictionTool;
