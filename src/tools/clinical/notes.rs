//! CHW notes tool

use tracing::{error, info};

use crate::core::{PatientId, ToolError, ToolName, ToolPayload};
use crate::tools::context::ToolContext;
use crate::tools::PatientTool;

pub const NO_NOTES: &str = "No notes found for this patient.";

/// Returns the latest Community Health Worker notes
#[derive(Debug, Clone, Default)]
pub struct NotesTool;

impl NotesTool {
    pub fn new() -> Self {
        Self
    }
}

impl PatientTool for NotesTool {
    fn name(&self) -> ToolName {
        ToolName::Notes
    }

    fn invoke(&self, patient_id: PatientId, ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        info!(%patient_id, "NOTES TOOL: getting notes");

        let record = ctx
            .patients
            .get(patient_id)
            .inspect_err(|e| error!(%patient_id, error = %e, "NOTES TOOL failed"))?;

        let notes = record
            .chw_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(NO_NOTES);

        Ok(ToolPayload::Notes {
            notes: notes.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::fixture_context;

    #[test]
    fn test_returns_notes() {
        let ctx = fixture_context();
        let payload = NotesTool::new().invoke(PatientId(2), &ctx).unwrap();
        assert_eq!(
            payload,
            ToolPayload::Notes {
                notes: "Worried about a ride to cardiology.".to_string()
            }
        );
    }

    #[test]
    fn test_missing_notes_placeholder() {
        let ctx = fixture_context();
        let payload = NotesTool::new().invoke(PatientId(3), &ctx).unwrap();
        assert_eq!(
            payload,
            ToolPayload::Notes {
                notes: NO_NOTES.to_string()
            }
        );
    }
}
