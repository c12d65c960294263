//! Linear-contribution explanations.
//!
//! Two distinct modes live here: per-prediction contributions
//! (`weight * value` for one transaction) and global importance (`|weight|`
//! across the whole model). They are never mixed.

use crate::error::ScoringError;
use crate::models::artifacts::ModelMetadata;
use crate::types::prediction::{FeatureContribution, FeatureImportance};
use serde::Deserialize;

/// How a contribution value is reported
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContributionMode {
    /// `|weight * value|`
    #[default]
    Absolute,
    /// `weight * value`, keeping the direction of influence
    Signed,
}

/// Which values are multiplied by the classifier weights
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContributionBasis {
    /// Scaled values, the same units the weights were fitted on
    #[default]
    Standardized,
    /// Values as submitted
    Raw,
}

/// Rank features by `|weight_i * value_i|`, keeping the top `k`.
///
/// Sorting is stable, so ties keep schema order. Ranking always uses the
/// magnitude; `mode` only controls the reported value.
pub fn explain(
    schema: &[String],
    weights: &[f64],
    values: &[f64],
    k: usize,
    mode: ContributionMode,
) -> Result<Vec<FeatureContribution>, ScoringError> {
    if schema.len() != weights.len() || schema.len() != values.len() {
        return Err(ScoringError::Internal(format!(
            "explanation shape mismatch: {} features, {} weights, {} values",
            schema.len(),
            weights.len(),
            values.len()
        )));
    }

    let mut ranked: Vec<(&String, f64)> = schema
        .iter()
        .zip(weights.iter().zip(values))
        .map(|(name, (w, x))| (name, w * x))
        .collect();

    if let Some((name, _)) = ranked.iter().find(|(_, c)| !c.is_finite()) {
        return Err(ScoringError::Internal(format!(
            "non-finite contribution for feature {name}"
        )));
    }

    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    Ok(ranked
        .into_iter()
        .take(k)
        .map(|(name, c)| FeatureContribution {
            feature: name.clone(),
            contribution: match mode {
                ContributionMode::Absolute => c.abs(),
                ContributionMode::Signed => c,
            },
        })
        .collect())
}

/// The `n` globally most important features, ties in schema order
pub fn global_importance(metadata: &ModelMetadata, n: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = metadata
        .feature_names
        .iter()
        .filter_map(|name| {
            metadata
                .feature_importance
                .get(name)
                .map(|&importance| FeatureImportance {
                    feature: name.clone(),
                    importance,
                })
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.abs().total_cmp(&a.importance.abs()));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifacts::fixtures::artifact_set;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranking_uses_weight_times_value() {
        let ranked = explain(
            &names(&["V1", "V2"]),
            &[2.0, 1.0],
            &[1.0, 5.0],
            5,
            ContributionMode::Absolute,
        )
        .unwrap();

        assert_eq!(ranked[0].feature, "V2");
        assert_eq!(ranked[0].contribution, 5.0);
        assert_eq!(ranked[1].feature, "V1");
        assert_eq!(ranked[1].contribution, 2.0);
    }

    #[test]
    fn test_top_k_is_non_increasing_and_truncated() {
        let schema = names(&["a", "b", "c", "d", "e", "f", "g"]);
        let weights = [0.5, -3.0, 1.0, 0.0, 2.0, -0.1, 4.0];
        let values = [1.0, 1.0, -2.0, 9.0, 0.5, 3.0, -1.0];

        let ranked = explain(&schema, &weights, &values, 5, ContributionMode::Signed).unwrap();

        assert_eq!(ranked.len(), 5);
        for pair in ranked.windows(2) {
            assert!(pair[0].contribution.abs() >= pair[1].contribution.abs());
        }
        assert_eq!(ranked[0].feature, "g");
        assert_eq!(ranked[0].contribution, -4.0);
        assert_eq!(ranked[1].feature, "b");
        assert_eq!(ranked[1].contribution, -3.0);
    }

    #[test]
    fn test_ties_keep_schema_order() {
        let ranked = explain(
            &names(&["x", "y", "z"]),
            &[1.0, -1.0, 1.0],
            &[2.0, 2.0, 2.0],
            3,
            ContributionMode::Absolute,
        )
        .unwrap();

        let order: Vec<&str> = ranked.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_k_larger_than_schema() {
        let ranked = explain(
            &names(&["only"]),
            &[1.0],
            &[1.0],
            5,
            ContributionMode::Absolute,
        )
        .unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_shape_mismatch_is_internal_error() {
        let result = explain(
            &names(&["a", "b"]),
            &[1.0],
            &[1.0, 2.0],
            5,
            ContributionMode::Absolute,
        );
        assert!(matches!(result, Err(ScoringError::Internal(_))));
    }

    #[test]
    fn test_explain_is_deterministic() {
        let schema = names(&["a", "b", "c"]);
        let first = explain(&schema, &[0.3, -0.7, 0.2], &[1.1, 0.4, -2.0], 2, ContributionMode::Signed);
        let second = explain(&schema, &[0.3, -0.7, 0.2], &[1.1, 0.4, -2.0], 2, ContributionMode::Signed);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_global_importance_ignores_transaction() {
        let set = artifact_set(&["V1", "V2", "V3", "Amount"], &[0.2, -1.5, 0.9, 0.05], 0.0);

        let top = global_importance(&set.metadata, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].feature, "V2");
        assert_eq!(top[0].importance, 1.5);
        assert_eq!(top[1].feature, "V3");
    }
}
