//! # Training Decomposer
//!
//! Turns the labeled dataset into one persisted binary sub-model per
//! ModelKey. A strictly binary target column (values exactly {0,1}) trains
//! one classifier under its base name; any other categorical target is
//! decomposed one-vs-rest, one classifier per distinct observed value under
//! `<base>__<value>`.
//!
//! Each sub-problem is fitted on a stratified 80/20 split and evaluated by
//! stratified k-fold cross-validation plus the held-out slice. Both figures
//! are report-only and never gate persistence. A degenerate sub-problem
//! (too few examples of one class for stratified splitting) fails on its
//! own; decomposition of the remaining targets continues.

use crate::data::{TargetColumn, TrainingDataset};
use crate::estimate::{self, EstimationError, FitOptions};
use crate::features::Preprocessor;
use crate::model::{ModelError, ScoringArtifact, TrainingReport};
use crate::profile::InputProfile;
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Fraction of each class held out for the report-only test AUC.
    pub test_fraction: f64,
    pub cv_folds: usize,
    /// Seed for every shuffle, so reruns produce identical splits.
    pub seed: u64,
    pub fit: FitOptions,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            test_fraction: 0.2,
            cv_folds: 5,
            seed: 42,
            fit: FitOptions::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(
        "degenerate target for sub-model '{key}': {positives} positive / {negatives} negative example(s); at least 2 of each are required for stratified splitting"
    )]
    DegenerateTarget {
        key: String,
        positives: usize,
        negatives: usize,
    },
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to prepare model directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one full decomposition run. Failed sub-models are reported,
/// not fatal: the artifacts of every successful sub-model are on disk.
#[derive(Debug, Default)]
pub struct TrainSummary {
    pub trained: Vec<String>,
    pub failed: Vec<(String, TrainError)>,
}

/// One derived binary problem: a ModelKey plus its 0/1 labels.
struct SubProblem {
    key: String,
    labels: Vec<f64>,
}

/// Decomposes every target column and trains/persists each sub-model into
/// `model_dir`, using the registry's artifact naming grammar.
pub fn decompose_and_train(
    dataset: &TrainingDataset,
    model_dir: &Path,
    options: &TrainOptions,
) -> Result<TrainSummary, TrainError> {
    fs::create_dir_all(model_dir)?;

    let mut summary = TrainSummary::default();
    for target in &dataset.targets {
        for problem in decompose_target(target) {
            match train_sub_model(&dataset.profiles, &problem, model_dir, options) {
                Ok(report) => {
                    log::info!(
                        "Trained sub-model '{}': CV AUC {} +/- {}, test AUC {}",
                        problem.key,
                        fmt_auc(report.cv_auc_mean),
                        fmt_auc(report.cv_auc_std),
                        fmt_auc(report.test_auc),
                    );
                    summary.trained.push(problem.key);
                }
                Err(error) => {
                    log::warn!("Skipping sub-model '{}': {error}", problem.key);
                    summary.failed.push((problem.key, error));
                }
            }
        }
    }
    Ok(summary)
}

fn fmt_auc(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "n/a".to_string(),
    }
}

/// Splits one target column into its derived binary sub-problems.
fn decompose_target(target: &TargetColumn) -> Vec<SubProblem> {
    let mut distinct: Vec<&str> = Vec::new();
    for value in &target.values {
        if !distinct.iter().any(|v| v == value) {
            distinct.push(value);
        }
    }

    let mut sorted = distinct.clone();
    sorted.sort_unstable();
    if sorted == ["0", "1"] {
        return vec![SubProblem {
            key: target.name.clone(),
            labels: target
                .values
                .iter()
                .map(|v| if v == "1" { 1.0 } else { 0.0 })
                .collect(),
        }];
    }

    // One-vs-rest, in order of first appearance.
    distinct
        .into_iter()
        .map(|value| SubProblem {
            key: format!("{}__{}", target.name, value),
            labels: target
                .values
                .iter()
                .map(|v| if v == value { 1.0 } else { 0.0 })
                .collect(),
        })
        .collect()
}

fn train_sub_model(
    profiles: &[InputProfile],
    problem: &SubProblem,
    model_dir: &Path,
    options: &TrainOptions,
) -> Result<TrainingReport, TrainError> {
    let positives = problem.labels.iter().filter(|&&l| l == 1.0).count();
    let negatives = problem.labels.len() - positives;
    if positives < 2 || negatives < 2 {
        return Err(TrainError::DegenerateTarget {
            key: problem.key.clone(),
            positives,
            negatives,
        });
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let (train_indices, test_indices) =
        stratified_split(&problem.labels, options.test_fraction, &mut rng);

    let train_profiles: Vec<InputProfile> =
        train_indices.iter().map(|&i| profiles[i].clone()).collect();
    let train_labels: Vec<f64> = train_indices.iter().map(|&i| problem.labels[i]).collect();

    // Report-only cross-validation over the training partition.
    let folds = stratified_folds(&train_labels, options.cv_folds, &mut rng);
    let fold_aucs: Vec<Option<f64>> = folds
        .par_iter()
        .map(|validation| evaluate_fold(&train_profiles, &train_labels, validation, &options.fit))
        .collect();
    let (cv_auc_mean, cv_auc_std) = summarize_aucs(&fold_aucs);

    // The persisted pipeline is fitted on the full training partition.
    let preprocessor = Preprocessor::fit(&train_profiles);
    let design = preprocessor.transform(&train_profiles);
    let labels = Array1::from_vec(train_labels);
    let model = estimate::fit_logistic(design.view(), labels.view(), &options.fit)?;

    let test_scores: Vec<f64> = test_indices
        .iter()
        .map(|&i| {
            let features = preprocessor.transform_one(&profiles[i]);
            model.probability(features.view())
        })
        .collect();
    let test_labels: Vec<f64> = test_indices.iter().map(|&i| problem.labels[i]).collect();
    let test_auc = estimate::roc_auc(&test_labels, &test_scores);

    let report = TrainingReport {
        sample_count: problem.labels.len(),
        positive_count: positives,
        cv_auc_mean,
        cv_auc_std,
        test_auc,
    };
    let artifact = ScoringArtifact {
        key: problem.key.clone(),
        preprocessor,
        model,
        report: report.clone(),
    };
    artifact.save(model_dir)?;
    Ok(report)
}

/// Fits one fold's complement and scores its validation slice. Folds whose
/// fit fails or whose validation slice holds a single class yield `None`.
fn evaluate_fold(
    profiles: &[InputProfile],
    labels: &[f64],
    validation: &[usize],
    fit: &FitOptions,
) -> Option<f64> {
    let held: Vec<bool> = {
        let mut held = vec![false; labels.len()];
        for &i in validation {
            held[i] = true;
        }
        held
    };

    let fit_profiles: Vec<InputProfile> = profiles
        .iter()
        .enumerate()
        .filter(|(i, _)| !held[*i])
        .map(|(_, p)| p.clone())
        .collect();
    let fit_labels: Array1<f64> = labels
        .iter()
        .enumerate()
        .filter(|(i, _)| !held[*i])
        .map(|(_, &l)| l)
        .collect();

    let preprocessor = Preprocessor::fit(&fit_profiles);
    let design = preprocessor.transform(&fit_profiles);
    let model = match estimate::fit_logistic(design.view(), fit_labels.view(), fit) {
        Ok(model) => model,
        Err(error) => {
            log::debug!("CV fold fit failed: {error}");
            return None;
        }
    };

    let scores: Vec<f64> = validation
        .iter()
        .map(|&i| {
            let features = preprocessor.transform_one(&profiles[i]);
            model.probability(features.view())
        })
        .collect();
    let validation_labels: Vec<f64> = validation.iter().map(|&i| labels[i]).collect();
    estimate::roc_auc(&validation_labels, &scores)
}

fn summarize_aucs(fold_aucs: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let values: Vec<f64> = fold_aucs.iter().flatten().copied().collect();
    if values.is_empty() {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (Some(mean), Some(variance.sqrt()))
}

/// Class-stratified shuffled train/test split. Each class contributes at
/// least one example to each side.
fn stratified_split(
    labels: &[f64],
    test_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [0.0, 1.0] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(rng);
        let held = ((indices.len() as f64 * test_fraction).round() as usize)
            .clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..held]);
        train.extend_from_slice(&indices[held..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Class-stratified fold assignment: shuffled round-robin within each class.
fn stratified_folds(labels: &[f64], folds: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let folds = folds.max(2);
    let mut assignment = vec![Vec::new(); folds];
    for class in [0.0, 1.0] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(rng);
        for (position, index) in indices.into_iter().enumerate() {
            assignment[position % folds].push(index);
        }
    }
    assignment
}
