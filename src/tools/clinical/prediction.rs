//! Readmission risk prediction tool

use tracing::{error, info};

use crate::core::{PatientId, ToolError, ToolName, ToolPayload};
use crate::tools::context::ToolContext;
use crate::tools::PatientTool;

/// Scores a patient with the logistic regression model
#[derive(Debug, Clone, Default)]
pub struct PredictionTool;

impl PredictionTool {
    pub fn new() -> Self {
        Self
    }
}

impl PatientTool for PredictionTool {
    fn name(&self) -> ToolName {
        ToolName::Prediction
    }

    fn invoke(&self, patient_id: PatientId, ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        info!(%patient_id, "PREDICTION TOOL: getting risk score");

        let score = ctx
            .imputed_row(patient_id)
            .and_then(|row| ctx.model.predict_proba(&row))
            .inspect_err(|e| error!(%patient_id, error = %e, "PREDICTION TOOL failed"))?;

        Ok(ToolPayload::Prediction {
            readmission_risk_score: round3(score),
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
