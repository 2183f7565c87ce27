//! Fitting of one binary sub-model: ridge-penalized logistic regression
//! estimated by iteratively reweighted least squares (IRLS).
//!
//! Each IRLS step solves the penalized normal equations
//! `(X'WX + r*I) beta = X'Wz` by an in-place Cholesky factorization. The
//! small ridge `r` is applied to every coefficient except the intercept and
//! keeps the solve well-posed when one-hot blocks are collinear or a class
//! is nearly separated.

use crate::model::LogisticModel;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

/// Probabilities are clamped away from the boundary so the working weights
/// and the deviance stay finite.
const PROBABILITY_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Convergence threshold on the largest absolute coefficient update.
    pub tolerance: f64,
    /// Ridge penalty on non-intercept coefficients.
    pub ridge: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 50,
            tolerance: 1e-6,
            ridge: 1e-4,
        }
    }
}

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("the derived binary target contains a single class; nothing to fit")]
    SingleClass,
    #[error("the penalized normal equations are not solvable (ill-conditioned design)")]
    IllConditioned,
    #[error("the fit produced non-finite coefficients; classes may be perfectly separated")]
    Unstable,
}

/// Fits a logistic model of `y` (0/1 labels) on the encoded design matrix
/// `x`, shape `[n_samples, n_features]`.
pub fn fit_logistic(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    options: &FitOptions,
) -> Result<LogisticModel, EstimationError> {
    let positives = y.iter().filter(|&&v| v == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(EstimationError::SingleClass);
    }

    // Augment with a leading intercept column.
    let n = x.nrows();
    let p = x.ncols() + 1;
    let mut design = Array2::ones((n, p));
    design.slice_mut(ndarray::s![.., 1..]).assign(&x);

    let mut beta = Array1::zeros(p);
    let mut converged = false;

    for _ in 0..options.max_iterations {
        let eta = design.dot(&beta);
        let mu = eta.mapv(|e| sigmoid(e).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR));
        let weights = mu.mapv(|m| m * (1.0 - m));
        // Working response of the weighted least squares step.
        let z = &eta + (&y.to_owned() - &mu) / &weights;

        // X'WX and X'Wz via one weighted copy of the design matrix.
        let mut weighted = design.clone();
        for (mut row, &w) in weighted.axis_iter_mut(Axis(0)).zip(weights.iter()) {
            row.mapv_inplace(|v| v * w);
        }
        let mut normal = design.t().dot(&weighted);
        let rhs = weighted.t().dot(&z);
        for j in 1..p {
            normal[[j, j]] += options.ridge;
        }

        let updated = cholesky_solve(normal, rhs).ok_or(EstimationError::IllConditioned)?;
        if updated.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::Unstable);
        }

        let step = (&updated - &beta).mapv(f64::abs).fold(0.0, |a: f64, &b| a.max(b));
        beta = updated;
        if step < options.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        log::warn!(
            "IRLS did not converge within {} iterations; keeping the last iterate",
            options.max_iterations
        );
    }

    Ok(LogisticModel {
        intercept: beta[0],
        coefficients: beta.slice(ndarray::s![1..]).to_owned(),
    })
}

pub fn sigmoid(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// Solves `A x = b` for symmetric positive-definite `A` by an in-place
/// lower-triangular Cholesky factorization. Returns `None` when `A` is not
/// positive definite.
fn cholesky_solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    for j in 0..n {
        let mut diagonal = a[[j, j]];
        for k in 0..j {
            diagonal -= a[[j, k]] * a[[j, k]];
        }
        if diagonal <= 0.0 || !diagonal.is_finite() {
            return None;
        }
        let root = diagonal.sqrt();
        a[[j, j]] = root;
        for i in (j + 1)..n {
            let mut off = a[[i, j]];
            for k in 0..j {
                off -= a[[i, k]] * a[[j, k]];
            }
            a[[i, j]] = off / root;
        }
    }
    // Forward substitution: L v = b.
    for i in 0..n {
        let mut v = b[i];
        for k in 0..i {
            v -= a[[i, k]] * b[k];
        }
        b[i] = v / a[[i, i]];
    }
    // Back substitution: L' x = v.
    for i in (0..n).rev() {
        let mut v = b[i];
        for k in (i + 1)..n {
            v -= a[[k, i]] * b[k];
        }
        b[i] = v / a[[i, i]];
    }
    Some(b)
}

/// Area under the ROC curve from raw scores, using midranks for ties.
/// Returns `None` when the labels contain a single class.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Option<f64> {
    debug_assert_eq!(labels.len(), scores.len());
    let positives = labels.iter().filter(|&&v| v == 1.0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let midrank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = midrank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&label, _)| label == 1.0)
        .map(|(_, &rank)| rank)
        .sum();
    let np = positives as f64;
    let u = positive_rank_sum - np * (np + 1.0) / 2.0;
    Some(u / (np * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn fits_a_separable_single_feature_problem() {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let model = fit_logistic(x.view(), y.view(), &FitOptions::default()).unwrap();
        let low = model.probability(array![-2.0].view());
        let high = model.probability(array![2.0].view());
        assert!(low < 0.5, "negative side scored {low}");
        assert!(high > 0.5, "positive side scored {high}");
        assert!(high > low);
    }

    #[test]
    fn single_class_targets_are_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.0, 1.0];
        match fit_logistic(x.view(), y.view(), &FitOptions::default()) {
            Err(EstimationError::SingleClass) => {}
            other => panic!("expected SingleClass, got {other:?}"),
        }
    }

    #[test]
    fn cholesky_solves_a_known_system() {
        // A = [[4,2],[2,3]], b = [10, 8] -> x = [1.75, 1.5].
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![10.0, 8.0];
        let x = cholesky_solve(a, b).unwrap();
        assert_abs_diff_eq!(x[0], 1.75, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn cholesky_rejects_indefinite_matrices() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        let b = array![1.0, 1.0];
        assert!(cholesky_solve(a, b).is_none());
    }

    #[test]
    fn auc_is_one_for_perfect_ranking_and_zero_for_inverted() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_abs_diff_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_abs_diff_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn auc_handles_ties_with_midranks() {
        let labels = [0.0, 1.0, 0.0, 1.0];
        let scores = [0.5, 0.5, 0.5, 0.5];
        assert_abs_diff_eq!(roc_auc(&labels, &scores).unwrap(), 0.5);
    }

    #[test]
    fn auc_is_undefined_for_single_class_labels() {
        assert!(roc_auc(&[1.0, 1.0], &[0.3, 0.7]).is_none());
    }
}
