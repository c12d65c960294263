//! Fits the scaler and a class-weighted logistic regression from history.
//!
//! The classifier minimizes
//! `sum_i s_i * logloss_i + ||w||^2 / (2C)` with balanced sample weights
//! `s_i = n / (2 * n_class(i))`, using Newton steps with a backtracking line
//! search. The intercept is not regularized.

use crate::config::TrainingConfig;
use crate::error::ArtifactError;
use crate::models::artifacts::{sigmoid, ArtifactSet, LinearClassifier, ModelMetadata, StandardScaler};
use crate::models::dataset::Dataset;
use crate::models::evaluation::EvaluationReport;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Decision threshold stamped into every artifact set
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Number of features listed in the training report
const REPORT_TOP_FEATURES: usize = 10;

/// Artifact set plus the evaluation that accompanied it
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ArtifactSet,
    pub evaluation: EvaluationReport,
}

/// Trains a fresh artifact set from the configured historical dataset
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Load the dataset from disk and train on it
    pub fn train(&self) -> Result<TrainingOutcome, ArtifactError> {
        let dataset = Dataset::from_csv(&self.config.dataset_path, &self.config)?;
        self.train_on(&dataset)
    }

    /// Train on an in-memory dataset
    pub fn train_on(&self, dataset: &Dataset) -> Result<TrainingOutcome, ArtifactError> {
        let split = dataset.stratified_split(self.config.test_fraction, self.config.seed)?;
        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            train_positives = split.train.positives(),
            "Split dataset"
        );

        // Scaling statistics come from the training partition only
        let scaler = StandardScaler::fit(dataset.feature_names.clone(), &split.train.rows);
        let degenerate = scaler.degenerate_features();
        if !degenerate.is_empty() {
            warn!(
                features = ?degenerate,
                "Zero-variance features standardize to 0 and carry no weight"
            );
        }

        let x_train: Vec<Vec<f64>> = split.train.rows.iter().map(|r| scaler.transform(r)).collect();
        let sample_weights = balanced_sample_weights(&split.train.labels);
        let (weights, intercept) = fit_logistic_regression(
            &x_train,
            &split.train.labels,
            &sample_weights,
            &self.config,
        )?;

        let classifier = LinearClassifier {
            feature_names: dataset.feature_names.clone(),
            weights,
            intercept,
        };

        let probabilities: Vec<f64> = split
            .test
            .rows
            .iter()
            .map(|r| classifier.predict_proba(&scaler.transform(r)))
            .collect();

        let mut ranked: Vec<(String, f64)> = classifier
            .feature_names
            .iter()
            .cloned()
            .zip(classifier.weights.iter().map(|w| w.abs()))
            .collect();
        let feature_importance = ranked.iter().cloned().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(REPORT_TOP_FEATURES);

        let evaluation = EvaluationReport::evaluate(
            &probabilities,
            &split.test.labels,
            DECISION_THRESHOLD,
            ranked,
        );

        let metadata = ModelMetadata {
            feature_names: dataset.feature_names.clone(),
            threshold: DECISION_THRESHOLD,
            feature_importance,
            training_timestamp: Utc::now(),
        };

        info!(
            roc_auc = evaluation.roc_auc,
            fraud_precision = evaluation.fraud.precision,
            fraud_recall = evaluation.fraud.recall,
            "Model trained"
        );

        Ok(TrainingOutcome {
            artifacts: ArtifactSet {
                classifier,
                scaler,
                metadata,
            },
            evaluation,
        })
    }
}

/// `n / (2 * n_class)` per sample, so both classes carry equal total weight
pub fn balanced_sample_weights(labels: &[bool]) -> Vec<f64> {
    let n = labels.len() as f64;
    let n_pos = labels.iter().filter(|&&l| l).count() as f64;
    let n_neg = n - n_pos;

    let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 0.0 };
    let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 0.0 };

    labels
        .iter()
        .map(|&l| if l { w_pos } else { w_neg })
        .collect()
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn decision(params: &[f64], row: &[f64]) -> f64 {
    let d = row.len();
    params[..d].iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + params[d]
}

fn objective(params: &[f64], x: &[Vec<f64>], y: &[bool], s: &[f64], c: f64) -> f64 {
    let d = params.len() - 1;
    let loss: f64 = x
        .iter()
        .zip(y)
        .zip(s)
        .map(|((row, &label), &weight)| {
            let z = decision(params, row);
            weight * (softplus(z) - if label { z } else { 0.0 })
        })
        .sum();
    let penalty: f64 = params[..d].iter().map(|w| w * w).sum::<f64>() / (2.0 * c);
    loss + penalty
}

/// Newton-fit the regularized weighted logistic loss; returns `(weights, intercept)`
fn fit_logistic_regression(
    x: &[Vec<f64>],
    y: &[bool],
    s: &[f64],
    config: &TrainingConfig,
) -> Result<(Vec<f64>, f64), ArtifactError> {
    let c = config.regularization;
    if !(c > 0.0 && c.is_finite()) {
        return Err(ArtifactError::Training(format!(
            "regularization must be positive, got {c}"
        )));
    }

    let d = x.first().map(Vec::len).unwrap_or(0);
    let dim = d + 1;
    let mut params = vec![0.0; dim];
    let mut converged = false;

    for iteration in 0..config.max_iter {
        let mut grad = vec![0.0; dim];
        let mut hess = vec![0.0; dim * dim];

        for ((row, &label), &weight) in x.iter().zip(y).zip(s) {
            let p = sigmoid(decision(&params, row));
            let r = weight * (p - if label { 1.0 } else { 0.0 });
            let h = weight * p * (1.0 - p);

            for j in 0..d {
                grad[j] += r * row[j];
                let hj = h * row[j];
                for k in j..d {
                    hess[j * dim + k] += hj * row[k];
                }
                hess[j * dim + d] += hj;
            }
            grad[d] += r;
            hess[d * dim + d] += h;
        }

        for j in 0..d {
            grad[j] += params[j] / c;
            hess[j * dim + j] += 1.0 / c;
        }
        // Keeps the intercept pivot positive once predictions saturate
        hess[d * dim + d] += 1e-10;
        for j in 0..dim {
            for k in 0..j {
                hess[j * dim + k] = hess[k * dim + j];
            }
        }

        let step = cholesky_solve(&mut hess, &grad, dim).ok_or_else(|| {
            ArtifactError::Training("Hessian is not positive definite".into())
        })?;

        let current = objective(&params, x, y, s, c);
        let slope: f64 = grad.iter().zip(&step).map(|(g, d)| g * d).sum();
        let mut t = 1.0;
        let mut candidate: Vec<f64>;
        loop {
            candidate = params.iter().zip(&step).map(|(p, d)| p - t * d).collect();
            if objective(&candidate, x, y, s, c) <= current - 1e-4 * t * slope || t < 1e-10 {
                break;
            }
            t *= 0.5;
        }

        let max_change = step.iter().map(|d| (t * d).abs()).fold(0.0, f64::max);
        params = candidate;

        debug!(iteration, objective = current, step = t, max_change, "Newton iteration");

        if max_change < config.tolerance {
            info!(iterations = iteration + 1, "Logistic regression converged");
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(max_iter = config.max_iter, "Logistic regression hit the iteration limit");
    }

    if params.iter().any(|p| !p.is_finite()) {
        return Err(ArtifactError::Training("fit produced non-finite parameters".into()));
    }

    let intercept = params[d];
    params.truncate(d);
    Ok((params, intercept))
}

/// Solve `A v = b` for symmetric positive definite `A` (row-major, overwritten)
fn cholesky_solve(a: &mut [f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    // In-place lower factor L with A = L L^T
    for j in 0..n {
        let mut diag = a[j * n + j];
        for k in 0..j {
            diag -= a[j * n + k] * a[j * n + k];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let ljj = diag.sqrt();
        a[j * n + j] = ljj;

        for i in (j + 1)..n {
            let mut v = a[i * n + j];
            for k in 0..j {
                v -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = v / ljj;
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut v = b[i];
        for k in 0..i {
            v -= a[i * n + k] * z[k];
        }
        z[i] = v / a[i * n + i];
    }

    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let mut v = z[i];
        for k in (i + 1)..n {
            v -= a[k * n + i] * out[k];
        }
        out[i] = v / a[i * n + i];
    }

    Some(out)
}
