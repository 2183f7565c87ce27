//! Fitted feature preprocessing: numeric standardization plus categorical
//! one-hot encoding with unknown categories dropped.
//!
//! A `Preprocessor` is fitted on the training partition of one sub-problem
//! and travels inside the persisted artifact, so the exact vocabulary and
//! scaling seen at fit time are reproduced at serving time. A category never
//! seen during fitting encodes as an all-zero block rather than an error.

use crate::profile::{CATEGORICAL_COLUMNS, InputProfile, NUMERIC_COLUMNS};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Standardization parameters for one numeric column.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NumericScaler {
    column: String,
    mean: f64,
    std_dev: f64,
}

impl NumericScaler {
    fn fit(column: &str, values: impl Iterator<Item = f64> + Clone) -> Self {
        let n = values.clone().count().max(1) as f64;
        let mean = values.clone().sum::<f64>() / n;
        let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        NumericScaler {
            column: column.to_string(),
            mean,
            // A constant column standardizes to all zeros instead of NaN.
            std_dev: if std_dev > 0.0 { std_dev } else { 1.0 },
        }
    }

    fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Sorted vocabulary for one categorical column.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryEncoder {
    column: String,
    vocabulary: Vec<String>,
}

impl CategoryEncoder {
    fn fit<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> Self {
        let mut vocabulary: Vec<String> = values.map(str::to_string).collect();
        vocabulary.sort_unstable();
        vocabulary.dedup();
        CategoryEncoder {
            column: column.to_string(),
            vocabulary,
        }
    }

    fn width(&self) -> usize {
        self.vocabulary.len()
    }

    /// Index of the hot entry for `value`, if the category was seen at fit time.
    fn position(&self, value: &str) -> Option<usize> {
        self.vocabulary.binary_search_by(|v| v.as_str().cmp(value)).ok()
    }
}

/// The fitted column transformer: two standardized numeric features followed
/// by one one-hot block per categorical column, in the canonical column order
/// of [`NUMERIC_COLUMNS`] and [`CATEGORICAL_COLUMNS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric: Vec<NumericScaler>,
    categorical: Vec<CategoryEncoder>,
}

impl Preprocessor {
    /// Learns scaling parameters and vocabularies from `profiles`.
    pub fn fit(profiles: &[InputProfile]) -> Self {
        let numeric = NUMERIC_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| {
                NumericScaler::fit(column, profiles.iter().map(move |p| p.numeric_values()[i]))
            })
            .collect();
        let categorical = CATEGORICAL_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| {
                CategoryEncoder::fit(column, profiles.iter().map(|p| p.categorical_values()[i]))
            })
            .collect();
        Preprocessor {
            numeric,
            categorical,
        }
    }

    /// Length of every encoded feature vector this preprocessor produces.
    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(CategoryEncoder::width).sum::<usize>()
    }

    /// Encodes one profile into a dense feature vector.
    pub fn transform_one(&self, profile: &InputProfile) -> Array1<f64> {
        let mut encoded = Array1::zeros(self.width());
        let numeric_values = profile.numeric_values();
        for (i, scaler) in self.numeric.iter().enumerate() {
            encoded[i] = scaler.transform(numeric_values[i]);
        }
        let mut offset = self.numeric.len();
        let categorical_values = profile.categorical_values();
        for (encoder, value) in self.categorical.iter().zip(categorical_values) {
            if let Some(position) = encoder.position(value) {
                encoded[offset + position] = 1.0;
            }
            offset += encoder.width();
        }
        encoded
    }

    /// Encodes a batch of profiles into a design matrix of shape
    /// `[profiles.len(), self.width()]`.
    pub fn transform(&self, profiles: &[InputProfile]) -> Array2<f64> {
        let mut design = Array2::zeros((profiles.len(), self.width()));
        for (row, profile) in profiles.iter().enumerate() {
            design.row_mut(row).assign(&self.transform_one(profile));
        }
        design
    }
}
