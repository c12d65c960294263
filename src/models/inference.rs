//! Scaled linear inference over a validated feature mapping

use crate::error::ScoringError;
use crate::models::artifacts::ArtifactSet;
use crate::types::features::{coerce_value, RawFeatures};
use tracing::debug;

/// Output of one inference call
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `probability >= threshold`
    pub is_fraud: bool,
    /// Fraud probability (0.0 - 1.0)
    pub probability: f64,
    /// Submitted values in schema order
    pub raw_values: Vec<f64>,
    /// Standardized values in schema order, as seen by the classifier
    pub standardized: Vec<f64>,
}

/// Fraud label for a probability.
///
/// A probability exactly equal to the threshold is classified as fraud.
pub fn classify(probability: f64, threshold: f64) -> bool {
    probability >= threshold
}

/// Reorder raw features into schema order.
///
/// Input is expected to have passed validation already; a missing or
/// non-numeric value here is an internal error.
pub fn ordered_values(features: &RawFeatures, schema: &[String]) -> Result<Vec<f64>, ScoringError> {
    schema
        .iter()
        .map(|name| {
            features
                .get(name)
                .and_then(coerce_value)
                .ok_or_else(|| {
                    ScoringError::Internal(format!("feature {name} missing or non-numeric at inference"))
                })
        })
        .collect()
}

/// Standardize, score and threshold one transaction.
///
/// Pure function of its inputs: identical artifacts and features always give
/// identical results.
pub fn predict(features: &RawFeatures, artifacts: &ArtifactSet) -> Result<Prediction, ScoringError> {
    let raw_values = ordered_values(features, artifacts.schema())?;
    let standardized = artifacts.scaler.transform(&raw_values);

    let probability = artifacts.classifier.predict_proba(&standardized);
    if !probability.is_finite() {
        return Err(ScoringError::Internal("non-finite fraud probability".into()));
    }

    let is_fraud = classify(probability, artifacts.metadata.threshold);

    debug!(
        probability = probability,
        is_fraud = is_fraud,
        "Inference complete"
    );

    Ok(Prediction {
        is_fraud,
        probability,
        raw_values,
        standardized,
    })
}
