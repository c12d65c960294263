//! Prediction results and the records handed to the persistence layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::RawFeatures;

/// One feature's influence on a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    /// Absolute or signed `weight * value`, depending on the configured mode
    pub contribution: f64,
}

/// A feature's global importance (`|weight|`), independent of any transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Model details attached to every prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub training_timestamp: DateTime<Utc>,
    pub threshold: f64,
}

/// Outcome of scoring one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// `fraud_probability >= threshold`
    pub is_fraud: bool,
    /// Fraud probability (0.0 - 1.0)
    pub fraud_probability: f64,
    /// Value of the monetary feature
    pub transaction_amount: f64,
    /// Strongest contributors, at most `top_k`, by decreasing magnitude
    pub top_contributing_features: Vec<FeatureContribution>,
    pub model_info: ModelInfo,
}

/// Read-only model summary for the model-info surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub training_timestamp: DateTime<Utc>,
    pub feature_count: usize,
    pub top_features: Vec<FeatureImportance>,
}

/// Historical record published for persistence after a successful score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// Unique record identifier
    pub record_id: String,

    /// Scoring timestamp
    pub scored_at: DateTime<Utc>,

    pub amount: f64,
    pub is_fraud: bool,
    pub fraud_probability: f64,

    /// Features exactly as submitted
    pub features: RawFeatures,

    pub top_contributing_features: Vec<FeatureContribution>,
    pub model_info: ModelInfo,
}

impl ScoredRecord {
    /// Create a record from a prediction and the features it was computed from
    pub fn new(result: &PredictionResult, features: RawFeatures) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            scored_at: Utc::now(),
            amount: result.transaction_amount,
            is_fraud: result.is_fraud,
            fraud_probability: result.fraud_probability,
            features,
            top_contributing_features: result.top_contributing_features.clone(),
            model_info: result.model_info.clone(),
        }
    }
}

/// Reply sent when a request cannot be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// `validation_error`, `invalid_json` or `internal_error`
    pub code: String,
    pub errors: Vec<String>,
}

impl Rejection {
    pub fn new(code: &str, errors: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            errors,
        }
    }

    /// Generic failure; details stay in the service logs
    pub fn internal() -> Self {
        Self::new("internal_error", vec!["Prediction failed".to_string()])
    }
}
