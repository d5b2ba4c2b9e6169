//! Risk explanation tool
//!
//! For a linear model the contribution of feature `i` relative to the
//! imputer baseline is `coef_i * (x_i - baseline_i)`, which is the exact
//! Shapley value under feature independence.

use std::cmp::Ordering;

use tracing::{error, info};

use crate::core::{PatientId, ToolError, ToolName, ToolPayload};
use crate::tools::context::ToolContext;
use crate::tools::PatientTool;

/// How many features the explanation reports
pub const TOP_FACTORS: usize = 3;

/// Ranks the features pushing a patient's risk up
#[derive(Debug, Clone, Default)]
pub struct ExplanationTool;

impl ExplanationTool {
    pub fn new() -> Self {
        Self
    }

    /// Per-feature contributions, highest first
    pub fn contributions(
        &self,
        patient_id: PatientId,
        ctx: &ToolContext,
    ) -> Result<Vec<(String, f64)>, ToolError> {
        let row = ctx.imputed_row(patient_id)?;

        let mut contributions = Vec::with_capacity(row.len());
        for (feature, value) in row {
            let coef = ctx.model.coefficient(&feature)?;
            let baseline = ctx.imputer.fill_value(&feature).unwrap_or(0.0);
            contributions.push((feature, coef * (value - baseline)));
        }

        // Stable sort keeps imputer order among ties
        contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(contributions)
    }
}

impl PatientTool for ExplanationTool {
    fn name(&self) -> ToolName {
        ToolName::Explanation
    }

    fn invoke(&self, patient_id: PatientId, ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        info!(%patient_id, "EXPLANATION TOOL: getting risk factors");

        let contributions = self
            .contributions(patient_id, ctx)
            .inspect_err(|e| error!(%patient_id, error = %e, "EXPLANATION TOOL failed"))?;

        Ok(ToolPayload::Explanation {
            top_risk_factors: contributions
                .into_iter()
                .take(TOP_FACTORS)
                .map(|(feature, _)| feature)
                .collect(),
        })
    }
}
