//! Rendering JSON values as text.

use serde_json::{Map, Number, Value};

/// Render a value for template substitution and loose comparison.
///
/// Strings are emitted raw (no quotes), `null` as `null`, and everything else
/// as compact JSON.
///
/// ```rust
/// use apirig_util::stringify_value;
/// use serde_json::json;
///
/// assert_eq!(stringify_value(&json!("abc")), "abc");
/// assert_eq!(stringify_value(&json!(42)), "42");
/// assert_eq!(stringify_value(&json!({"a": 1})), r#"{"a":1}"#);
/// ```
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Serialize a value with object keys sorted at every depth.
///
/// Arrays keep their order, so two arrays with the same elements in a
/// different order produce different text. Integral floats render as
/// integers, so `3.0` and `3` produce the same text.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            let mut sorted = Map::new();
            for (key, nested) in entries {
                sorted.insert(key.clone(), sort_keys(nested));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        Value::Number(number) => normalize_number(number),
        other => other.clone(),
    }
}

fn normalize_number(number: &Number) -> Value {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < I64_BOUND => {
            Value::from(float as i64)
        }
        _ => Value::Number(number.clone()),
    }
}

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
