//! Dependency bundle shared by every tool
//!
//! The risk model, the imputer and the patient table are loaded once at
//! startup and handed to runs as `Arc<ToolContext>`. Nothing mutates them
//! afterwards, so concurrent runs read them without locking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{PatientId, Result, ToolError, VertexCareError};

/// Suffix of model directories produced by the training pipeline
pub const MODEL_DIR_SUFFIX: &str = "_logistic_regression";
/// Model file inside a model directory
pub const MODEL_FILE: &str = "logistic_regression_model.json";
/// Imputer file inside `models/`
pub const IMPUTER_FILE: &str = "imputer.json";
/// Patient table inside `data/`
pub const PATIENTS_FILE: &str = "patients.json";

/// Logistic regression readmission model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskModel {
    pub intercept: f64,
    /// Weight per feature name
    pub coefficients: BTreeMap<String, f64>,
}

impl RiskModel {
    pub fn coefficient(&self, feature: &str) -> std::result::Result<f64, ToolError> {
        self.coefficients
            .get(feature)
            .copied()
            .ok_or_else(|| ToolError::MissingFeature(feature.to_string()))
    }

    /// Probability of the positive class for an already-imputed feature row
    pub fn predict_proba(&self, row: &[(String, f64)]) -> std::result::Result<f64, ToolError> {
        let mut logit = self.intercept;
        for (feature, value) in row {
            logit += self.coefficient(feature)? * value;
        }
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Fills missing feature values with per-feature statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    /// Feature order the imputer was fitted on
    pub feature_names_out: Vec<String>,
    /// Fill value per feature, aligned with `feature_names_out`
    pub statistics: Vec<f64>,
}

impl Imputer {
    pub fn fill_value(&self, feature: &str) -> Option<f64> {
        self.feature_names_out
            .iter()
            .position(|name| name == feature)
            .and_then(|idx| self.statistics.get(idx).copied())
    }

    fn check(&self, path: &Path) -> Result<()> {
        if self.feature_names_out.len() != self.statistics.len() {
            return Err(VertexCareError::artifact(
                path,
                format!(
                    "{} feature names but {} statistics",
                    self.feature_names_out.len(),
                    self.statistics.len()
                ),
            ));
        }
        Ok(())
    }
}

/// One row of the patient table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    /// Feature values; `null` means missing
    #[serde(default)]
    pub features: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub chw_notes: Option<String>,
}

/// Patient rows indexed by id
#[derive(Debug, Clone, Default)]
pub struct PatientTable {
    records: HashMap<PatientId, PatientRecord>,
    /// Union of the feature columns over all rows
    columns: BTreeSet<String>,
}

impl PatientTable {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        let columns = records
            .iter()
            .flat_map(|r| r.features.keys().cloned())
            .collect();
        let records = records.into_iter().map(|r| (r.patient_id, r)).collect();
        Self { records, columns }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, feature: &str) -> bool {
        self.columns.contains(feature)
    }

    pub fn get(&self, patient_id: PatientId) -> std::result::Result<&PatientRecord, ToolError> {
        if self.records.is_empty() {
            return Err(ToolError::DataNotLoaded);
        }
        self.records
            .get(&patient_id)
            .ok_or(ToolError::PatientNotFound(patient_id))
    }
}

/// Read-only dependencies injected into every tool call
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub model: RiskModel,
    pub imputer: Imputer,
    pub patients: PatientTable,
}

impl ToolContext {
    pub fn new(model: RiskModel, imputer: Imputer, patients: PatientTable) -> Self {
        Self {
            model,
            imputer,
            patients,
        }
    }

    /// Load the bundle from an artifacts root laid out as
    /// `models/<stamp>_logistic_regression/`, `models/imputer.json`, `data/patients.json`.
    pub fn load(root: &Path) -> Result<Self> {
        let models_dir = root.join("models");
        let model_dir = find_latest_model_dir(&models_dir)?;

        let model: RiskModel = read_json(&model_dir.join(MODEL_FILE))?;

        let imputer_path = models_dir.join(IMPUTER_FILE);
        let imputer: Imputer = read_json(&imputer_path)?;
        imputer.check(&imputer_path)?;

        let records: Vec<PatientRecord> = read_json(&root.join("data").join(PATIENTS_FILE))?;
        let patients = PatientTable::new(records);

        info!(
            model_dir = %model_dir.display(),
            features = imputer.feature_names_out.len(),
            patients = patients.len(),
            "Loaded model, imputer, and patient data"
        );

        Ok(Self::new(model, imputer, patients))
    }

    /// Imputer features that exist in the patient table, in imputer order
    pub fn model_features(&self) -> Vec<&str> {
        self.imputer
            .feature_names_out
            .iter()
            .filter(|name| self.patients.has_column(name))
            .map(String::as_str)
            .collect()
    }

    /// The patient's model features with missing values filled in
    pub fn imputed_row(
        &self,
        patient_id: PatientId,
    ) -> std::result::Result<Vec<(String, f64)>, ToolError> {
        let record = self.patients.get(patient_id)?;
        let features = self.model_features();
        if features.is_empty() {
            return Err(ToolError::NoFeatures);
        }

        Ok(features
            .into_iter()
            .map(|name| {
                let value = record
                    .features
                    .get(name)
                    .copied()
                    .flatten()
                    .or_else(|| self.imputer.fill_value(name))
                    .unwrap_or(0.0);
                (name.to_string(), value)
            })
            .collect())
    }
}

/// Pick the newest `*_logistic_regression` directory.
///
/// Directory names start with a `YYYY-MM-DD_HH-MM-SS` stamp, so the
/// lexicographically last one is the most recent.
pub fn find_latest_model_dir(models_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(models_dir)
        .map_err(|e| VertexCareError::artifact(models_dir, e.to_string()))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MODEL_DIR_SUFFIX))
        })
        .collect();

    candidates.sort();
    let latest = candidates
        .pop()
        .ok_or_else(|| VertexCareError::NoModelDirectory(models_dir.to_path_buf()))?;

    info!(dir = %latest.display(), "Found latest model directory");
    Ok(latest)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).map_err(|e| VertexCareError::artifact(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| VertexCareError::artifact(path, e.to_string()))
}
