//! Raw feature mappings as submitted by callers

use serde_json::Value;

/// Feature name to submitted value, before validation.
///
/// Values stay untyped JSON so that non-numeric submissions can be reported
/// per feature instead of failing deserialization as a whole.
pub type RawFeatures = serde_json::Map<String, Value>;

/// Convert a submitted value to a finite `f64`.
///
/// Accepts JSON numbers and strings holding a number (surrounding whitespace
/// allowed). NaN and infinities are rejected.
pub fn coerce_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_numbers_and_numeric_strings() {
        assert_eq!(coerce_value(&json!(1.5)), Some(1.5));
        assert_eq!(coerce_value(&json!(-3)), Some(-3.0));
        assert_eq!(coerce_value(&json!(" 42.0 ")), Some(42.0));
        assert_eq!(coerce_value(&json!("1e2")), Some(100.0));
    }

    #[test]
    fn test_coerce_rejects_non_numeric() {
        assert_eq!(coerce_value(&json!("abc")), None);
        assert_eq!(coerce_value(&json!(null)), None);
        assert_eq!(coerce_value(&json!(true)), None);
        assert_eq!(coerce_value(&json!([1.0])), None);
        assert_eq!(coerce_value(&json!("NaN")), None);
        assert_eq!(coerce_value(&json!("inf")), None);
    }
}
