//! The scoring facade called by the transport layer.
//!
//! Holds an explicit, immutable artifact handle built once at startup.

use crate::config::{ModelConfig, ValidationConfig};
use crate::error::{ArtifactError, ScoringError};
use crate::models::artifacts::ArtifactSet;
use crate::models::explain::{self, ContributionBasis, ContributionMode};
use crate::models::inference;
use crate::types::features::RawFeatures;
use crate::types::prediction::{ModelDescription, ModelInfo, PredictionResult};
use crate::validation::FeatureValidator;
use std::sync::Arc;

/// Validates, scores and explains transactions against one artifact set
#[derive(Debug, Clone)]
pub struct ScoringService {
    artifacts: Arc<ArtifactSet>,
    validator: FeatureValidator,
    /// Schema position of the monetary feature
    amount_index: usize,
    top_k: usize,
    describe_top_n: usize,
    contribution_mode: ContributionMode,
    contribution_basis: ContributionBasis,
}

impl ScoringService {
    /// Build the service, refusing inconsistent artifacts
    pub fn new(
        artifacts: ArtifactSet,
        model: &ModelConfig,
        validation: &ValidationConfig,
    ) -> Result<Self, ArtifactError> {
        artifacts.check_consistency()?;

        let amount_index = artifacts
            .schema()
            .iter()
            .position(|name| *name == model.amount_feature)
            .ok_or_else(|| {
                ArtifactError::Inconsistent(format!(
                    "schema has no {} feature",
                    model.amount_feature
                ))
            })?;

        Ok(Self {
            artifacts: Arc::new(artifacts),
            validator: FeatureValidator::new(model.amount_feature.clone(), validation),
            amount_index,
            top_k: model.top_k,
            describe_top_n: model.describe_top_n,
            contribution_mode: model.contribution_mode,
            contribution_basis: model.contribution_basis,
        })
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Score one submitted feature mapping.
    ///
    /// Invalid input yields [`ScoringError::Validation`] and never reaches
    /// the predictor.
    pub fn score(&self, features: &RawFeatures) -> Result<PredictionResult, ScoringError> {
        let artifacts = self.artifacts.as_ref();

        let errors = self.validator.validate(features, artifacts.schema());
        if !errors.is_empty() {
            return Err(ScoringError::Validation(errors));
        }

        let prediction = inference::predict(features, artifacts)?;

        let basis = match self.contribution_basis {
            ContributionBasis::Standardized => &prediction.standardized,
            ContributionBasis::Raw => &prediction.raw_values,
        };
        let top_contributing_features = explain::explain(
            artifacts.schema(),
            &artifacts.classifier.weights,
            basis,
            self.top_k,
            self.contribution_mode,
        )?;

        Ok(PredictionResult {
            is_fraud: prediction.is_fraud,
            fraud_probability: prediction.probability,
            transaction_amount: prediction.raw_values[self.amount_index],
            top_contributing_features,
            model_info: ModelInfo {
                training_timestamp: artifacts.metadata.training_timestamp,
                threshold: artifacts.metadata.threshold,
            },
        })
    }

    /// Training time, schema size and the globally most important features
    pub fn describe_model(&self) -> ModelDescription {
        let metadata = &self.artifacts.metadata;
        ModelDescription {
            training_timestamp: metadata.training_timestamp,
            feature_count: metadata.feature_names.len(),
            top_features: explain::global_importance(metadata, self.describe_top_n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifacts::fixtures::artifact_set;
    use serde_json::json;

    fn service(model: ModelConfig) -> ScoringService {
        let mut set = artifact_set(&["V1", "V2", "Amount"], &[2.0, 1.0, 0.001], -3.0);
        set.scaler.mean = vec![0.0, 0.0, 100.0];
        set.scaler.std = vec![1.0, 1.0, 100.0];
        ScoringService::new(set, &model, &ValidationConfig::default()).unwrap()
    }

    fn input(v1: f64, v2: f64, amount: f64) -> RawFeatures {
        let mut features = RawFeatures::new();
        features.insert("V1".into(), json!(v1));
        features.insert("V2".into(), json!(v2));
        features.insert("Amount".into(), json!(amount));
        features
    }

    #[test]
    fn test_score_returns_full_result() {
        let result = service(ModelConfig::default()).score(&input(1.0, 5.0, 300.0)).unwrap();

        assert_eq!(result.transaction_amount, 300.0);
        assert!(result.is_fraud);
        assert!((0.0..=1.0).contains(&result.fraud_probability));
        assert_eq!(result.model_info.threshold, 0.5);
        assert_eq!(result.top_contributing_features.len(), 3);
        assert_eq!(result.top_contributing_features[0].feature, "V2");
        assert_eq!(result.top_contributing_features[1].feature, "V1");
    }

    #[test]
    fn test_invalid_input_never_scored() {
        let err = service(ModelConfig::default())
            .score(&input(1.0, 500.0, 0.0))
            .unwrap_err();

        match err {
            ScoringError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_signed_raw_contributions() {
        let model = ModelConfig {
            top_k: 2,
            contribution_mode: ContributionMode::Signed,
            contribution_basis: ContributionBasis::Raw,
            ..ModelConfig::default()
        };
        let result = service(model).score(&input(-4.0, 0.5, 1000.0)).unwrap();

        assert_eq!(result.top_contributing_features.len(), 2);
        assert_eq!(result.top_contributing_features[0].feature, "V1");
        assert_eq!(result.top_contributing_features[0].contribution, -8.0);
        assert_eq!(result.top_contributing_features[1].feature, "Amount");
        assert!((result.top_contributing_features[1].contribution - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_describe_model_uses_global_importance() {
        let description = service(ModelConfig::default()).describe_model();

        assert_eq!(description.feature_count, 3);
        let order: Vec<&str> = description
            .top_features
            .iter()
            .map(|f| f.feature.as_str())
            .collect();
        assert_eq!(order, vec!["V1", "V2", "Amount"]);
    }

    #[test]
    fn test_schema_without_amount_is_rejected() {
        let set = artifact_set(&["V1", "V2"], &[1.0, 1.0], 0.0);
        let err = ScoringService::new(set, &ModelConfig::default(), &ValidationConfig::default())
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Inconsistent(_)));
    }
}
