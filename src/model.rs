//! # Persisted Sub-Model Artifacts
//!
//! The self-contained, human-readable TOML artifact one training sub-problem
//! produces and the registry later consumes. An artifact bundles everything
//! scoring needs: the ModelKey it was trained under, the fitted feature
//! preprocessor, the logistic coefficients, and report-only training metrics.

use crate::estimate::sigmoid;
use crate::features::Preprocessor;
use crate::profile::InputProfile;
use crate::taxonomy;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coefficients of one fitted binary classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl LogisticModel {
    /// Probability of the positive class for one encoded feature vector.
    pub fn probability(&self, features: ArrayView1<'_, f64>) -> f64 {
        sigmoid(self.intercept + self.coefficients.dot(&features))
    }
}

/// Report-only quality figures recorded at training time. They never gate
/// persistence or serving; folds whose validation slice held a single class
/// are skipped, so the cross-validation fields may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub sample_count: usize,
    pub positive_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_auc_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_auc_std: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_auc: Option<f64>,
}

/// One persisted Scoring Capability, bound to exactly one ModelKey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringArtifact {
    pub key: String,
    pub preprocessor: Preprocessor,
    pub model: LogisticModel,
    pub report: TrainingReport,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read or write model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML model artifact: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize model artifact to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl ScoringArtifact {
    /// Scores one profile: probability of the positive class in `[0, 1]`.
    pub fn score(&self, profile: &InputProfile) -> f64 {
        let features = self.preprocessor.transform_one(profile);
        self.model.probability(features.view())
    }

    /// Persists the artifact under its ModelKey in `dir`, using the
    /// `tov_r1_<key>.toml` naming grammar. Returns the written path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ModelError> {
        let path = dir.join(taxonomy::artifact_file_name(&self.key));
        let serialized = toml::to_string_pretty(self)?;
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        writer.write_all(serialized.as_bytes())?;
        writer.flush()?;
        Ok(path)
    }

    /// Loads one artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = fs::read_to_string(path)?;
        let artifact = toml::from_str(&contents)?;
        Ok(artifact)
    }
}

/// An artifact that scores every profile with the same probability,
/// regardless of features. Handy for fallback-path tests.
#[cfg(test)]
pub(crate) fn constant_artifact(key: &str, probability: f64) -> ScoringArtifact {
    let profiles = vec![crate::profile::sample_profile()];
    let preprocessor = Preprocessor::fit(&profiles);
    let width = preprocessor.width();
    ScoringArtifact {
        key: key.to_string(),
        preprocessor,
        model: LogisticModel {
            intercept: (probability / (1.0 - probability)).ln(),
            coefficients: Array1::zeros(width),
        },
        report: TrainingReport::default(),
    }
}
