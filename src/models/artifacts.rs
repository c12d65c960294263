//! Trained model artifacts: classifier, scaler and metadata.
//!
//! An `ArtifactSet` is immutable once trained. Retraining produces a new set
//! that replaces the persisted one wholesale.

use crate::error::ArtifactError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard deviations at or below this are treated as zero variance
pub const MIN_STD: f64 = 1e-12;

/// Linear binary classifier over standardized features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearClassifier {
    /// `w . x + b`
    pub fn decision_function(&self, standardized: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(standardized)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }

    /// Probability of the fraud class
    pub fn predict_proba(&self, standardized: &[f64]) -> f64 {
        sigmoid(self.decision_function(standardized))
    }
}

/// Per-feature standardization parameters fitted on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// Fit mean and population standard deviation per column of `rows`
    pub fn fit(feature_names: Vec<String>, rows: &[Vec<f64>]) -> Self {
        let width = feature_names.len();
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = x - m;
                *v += d * d;
            }
        }
        let std = var.into_iter().map(|v| (v / n).sqrt()).collect();

        Self {
            feature_names,
            mean,
            std,
        }
    }

    /// Standardize one value of feature `index`.
    ///
    /// Zero-variance features map to 0.0, so they never contribute to the
    /// decision score.
    pub fn transform_value(&self, index: usize, value: f64) -> f64 {
        let std = self.std[index];
        if std <= MIN_STD {
            0.0
        } else {
            (value - self.mean[index]) / std
        }
    }

    /// Standardize a full row in schema order
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| self.transform_value(i, v))
            .collect()
    }

    /// Names of features whose training variance was zero
    pub fn degenerate_features(&self) -> Vec<&str> {
        self.feature_names
            .iter()
            .zip(&self.std)
            .filter(|(_, &s)| s <= MIN_STD)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Schema and bookkeeping recorded at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Authoritative feature order
    pub feature_names: Vec<String>,
    /// Decision threshold on the fraud probability
    pub threshold: f64,
    /// Feature name to `|weight|`
    pub feature_importance: BTreeMap<String, f64>,
    pub training_timestamp: DateTime<Utc>,
}

/// Classifier, scaler and metadata produced by one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub classifier: LinearClassifier,
    pub scaler: StandardScaler,
    pub metadata: ModelMetadata,
}

impl ArtifactSet {
    /// Schema feature order
    pub fn schema(&self) -> &[String] {
        &self.metadata.feature_names
    }

    /// Verify that all three artifacts describe the same features in the same order
    pub fn check_consistency(&self) -> Result<(), ArtifactError> {
        let schema = &self.metadata.feature_names;
        if schema.is_empty() {
            return Err(ArtifactError::Inconsistent("schema is empty".into()));
        }
        if self.scaler.feature_names != *schema {
            return Err(ArtifactError::Inconsistent(
                "scaler feature order differs from metadata schema".into(),
            ));
        }
        if self.classifier.feature_names != *schema {
            return Err(ArtifactError::Inconsistent(
                "classifier feature order differs from metadata schema".into(),
            ));
        }

        let width = schema.len();
        if self.scaler.mean.len() != width || self.scaler.std.len() != width {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler has {} means and {} deviations for {} features",
                self.scaler.mean.len(),
                self.scaler.std.len(),
                width
            )));
        }
        if self.classifier.weights.len() != width {
            return Err(ArtifactError::Inconsistent(format!(
                "classifier has {} weights for {} features",
                self.classifier.weights.len(),
                width
            )));
        }

        let all_finite = self
            .classifier
            .weights
            .iter()
            .chain(&self.scaler.mean)
            .chain(&self.scaler.std)
            .chain(std::iter::once(&self.classifier.intercept))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtifactError::Inconsistent(
                "non-finite model parameter".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.metadata.threshold) {
            return Err(ArtifactError::Inconsistent(format!(
                "threshold {} outside [0, 1]",
                self.metadata.threshold
            )));
        }

        Ok(())
    }
}

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Hand-built artifact set with identity scaling
    pub fn artifact_set(names: &[&str], weights: &[f64], intercept: f64) -> ArtifactSet {
        let feature_names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let feature_importance = feature_names
            .iter()
            .cloned()
            .zip(weights.iter().map(|w| w.abs()))
            .collect();

        ArtifactSet {
            classifier: LinearClassifier {
                feature_names: feature_names.clone(),
                weights: weights.to_vec(),
                intercept,
            },
            scaler: StandardScaler {
                feature_names: feature_names.clone(),
                mean: vec![0.0; names.len()],
                std: vec![1.0; names.len()],
            },
            metadata: ModelMetadata {
                feature_names,
                threshold: 0.5,
                feature_importance,
                training_timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_fit_population_std() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(vec!["a".into(), "b".into()], &rows);

        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.std, vec![1.0, 0.0]);
        assert_eq!(scaler.transform(&[4.0, 7.0]), vec![2.0, 0.0]);
        assert_eq!(scaler.degenerate_features(), vec!["b"]);
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0 && sigmoid(800.0) > 0.999);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(-800.0) < 1e-300);
        assert!(!sigmoid(-800.0).is_nan());
    }

    #[test]
    fn test_consistency_check() {
        let set = fixtures::artifact_set(&["V1", "V2", "Amount"], &[1.0, -2.0, 0.1], 0.0);
        assert!(set.check_consistency().is_ok());

        let mut reordered = set.clone();
        reordered.scaler.feature_names.swap(0, 1);
        assert!(matches!(
            reordered.check_consistency(),
            Err(ArtifactError::Inconsistent(_))
        ));

        let mut short = set.clone();
        short.classifier.weights.pop();
        assert!(short.check_consistency().is_err());

        let mut bad_threshold = set;
        bad_threshold.metadata.threshold = 1.5;
        assert!(bad_threshold.check_consistency().is_err());
    }
}
