//! Input validation against the feature schema recorded at training time.
//!
//! Every rule is evaluated independently so a caller sees all problems with a
//! submission at once.

use crate::config::ValidationConfig;
use crate::types::features::{coerce_value, RawFeatures};
use serde::Serialize;
use std::fmt;

/// Ordered, human-readable validation messages. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }

    fn push(&mut self, message: String) {
        self.0.push(message);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

/// Checks raw feature mappings before they reach the predictor
#[derive(Debug, Clone)]
pub struct FeatureValidator {
    /// Monetary feature exempt from the magnitude rule
    amount_feature: String,
    max_abs_value: f64,
    amount_min_exclusive: f64,
    amount_max: f64,
}

impl FeatureValidator {
    pub fn new(amount_feature: impl Into<String>, config: &ValidationConfig) -> Self {
        Self {
            amount_feature: amount_feature.into(),
            max_abs_value: config.max_abs_value,
            amount_min_exclusive: config.amount_min_exclusive,
            amount_max: config.amount_max,
        }
    }

    /// Validate `features` against `schema`, returning every violation found
    pub fn validate(&self, features: &RawFeatures, schema: &[String]) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        let missing: Vec<&str> = schema
            .iter()
            .filter(|name| !features.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            errors.push(format!("Missing features: {}", missing.join(", ")));
        }

        let extra: Vec<&str> = features
            .keys()
            .filter(|name| !schema.contains(*name))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            errors.push(format!(
                "Extra features not used by model: {}",
                extra.join(", ")
            ));
        }

        for name in schema {
            let Some(raw) = features.get(name) else {
                continue;
            };

            let Some(value) = coerce_value(raw) else {
                errors.push(format!("Feature {name} has invalid value: {raw}"));
                continue;
            };

            if *name == self.amount_feature {
                if value <= self.amount_min_exclusive || value > self.amount_max {
                    errors.push(format!(
                        "Amount {value} is outside reasonable range ({}-{})",
                        self.amount_min_exclusive, self.amount_max
                    ));
                }
            } else if value.abs() > self.max_abs_value {
                errors.push(format!(
                    "Feature {name} has unusually large value: {value}"
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn schema() -> Vec<String> {
        ["V1", "V2", "V3", "Amount"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn features(pairs: &[(&str, Value)]) -> RawFeatures {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn validator() -> FeatureValidator {
        FeatureValidator::new("Amount", &ValidationConfig::default())
    }

    fn valid_with_amount(amount: Value) -> RawFeatures {
        features(&[
            ("V1", json!(0.5)),
            ("V2", json!(-1.2)),
            ("V3", json!(2.0)),
            ("Amount", amount),
        ])
    }

    #[test]
    fn test_valid_input_has_no_errors() {
        let errors = validator().validate(&valid_with_amount(json!(100.0)), &schema());
        assert!(errors.is_empty(), "unexpected errors: {errors}");
    }

    #[test]
    fn test_missing_features_listed_in_one_message() {
        let input = features(&[("V1", json!(0.1)), ("Amount", json!(10.0))]);
        let errors = validator().validate(&input, &schema());

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.messages()[0], "Missing features: V2, V3");
    }

    #[test]
    fn test_every_missing_key_is_referenced() {
        let schema = schema();
        for skipped in &schema {
            let mut input = valid_with_amount(json!(50.0));
            input.remove(skipped);
            let errors = validator().validate(&input, &schema);
            assert!(!errors.is_empty());
            assert!(errors.messages()[0].contains(skipped.as_str()));
        }
    }

    #[test]
    fn test_extra_features_reported() {
        let mut input = valid_with_amount(json!(10.0));
        input.insert("merchant".to_string(), json!("acme"));
        input.insert("V99".to_string(), json!(1.0));

        let errors = validator().validate(&input, &schema());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.messages()[0],
            "Extra features not used by model: V99, merchant"
        );
    }

    #[test]
    fn test_non_numeric_value_reported_per_feature() {
        let input = features(&[
            ("V1", json!("abc")),
            ("V2", json!(null)),
            ("V3", json!("1.5")),
            ("Amount", json!(10.0)),
        ]);

        let errors = validator().validate(&input, &schema());
        assert_eq!(
            errors.messages(),
            &[
                "Feature V1 has invalid value: \"abc\"".to_string(),
                "Feature V2 has invalid value: null".to_string(),
            ]
        );
    }

    #[test]
    fn test_large_magnitude_is_flagged_except_amount() {
        let input = features(&[
            ("V1", json!(150.0)),
            ("V2", json!(-100.5)),
            ("V3", json!(100.0)),
            ("Amount", json!(5000.0)),
        ]);

        let errors = validator().validate(&input, &schema());
        assert_eq!(
            errors.messages(),
            &[
                "Feature V1 has unusually large value: 150".to_string(),
                "Feature V2 has unusually large value: -100.5".to_string(),
            ]
        );
    }

    #[test]
    fn test_amount_range_enforced() {
        for amount in [json!(0.0), json!(25000.01), json!(-5.0)] {
            let errors = validator().validate(&valid_with_amount(amount.clone()), &schema());
            assert_eq!(errors.len(), 1, "amount {amount} should be rejected");
            assert!(errors.messages()[0].contains("outside reasonable range"));
        }

        for amount in [json!(0.01), json!(100.0), json!(25000.0)] {
            let errors = validator().validate(&valid_with_amount(amount.clone()), &schema());
            assert!(errors.is_empty(), "amount {amount} should be accepted");
        }
    }

    #[test]
    fn test_all_rules_accumulate() {
        let input = features(&[
            ("V1", json!("x")),
            ("V2", json!(500.0)),
            ("Amount", json!(0.0)),
            ("extra", json!(1.0)),
        ]);

        let errors = validator().validate(&input, &schema());
        assert_eq!(errors.len(), 5);
        assert!(errors.messages()[0].starts_with("Missing features: V3"));
        assert!(errors.messages()[1].starts_with("Extra features"));
    }
}
