//! Value comparison used by every assertion kind.

use apirig_util::{canonical_json, stringify_value};
use regex::Regex;
use serde_json::Value;

use crate::errors::AssertionError;

const REGEX_PREFIX: &str = "regex:";

/// Compare an observed value with an expected one.
///
/// Rules, in order:
/// 1. An expected string starting with `regex:` is a pattern matched against
///    the rendered actual value.
/// 2. When both sides are structured (an expected string holding a JSON
///    object or array counts), they are compared by canonical serialization
///    with object keys sorted. Array order matters.
/// 3. Otherwise the values are compared loosely (see [`loose_equals`]).
pub fn compare_values(actual: &Value, expected: &Value) -> Result<bool, AssertionError> {
    if let Value::String(text) = expected
        && let Some(pattern) = text.strip_prefix(REGEX_PREFIX)
    {
        let regex = Regex::new(pattern).map_err(|error| AssertionError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: error.to_string(),
        })?;
        return Ok(regex.is_match(&render_for_match(actual)));
    }

    if is_structured(actual)
        && let Some(expected_structure) = as_structured(expected)
    {
        return Ok(canonical_json(actual) == canonical_json(&expected_structure));
    }

    Ok(loose_equals(actual, expected))
}

/// Loose equality between primitives.
///
/// - `null` equals only `null`.
/// - Booleans count as `1`/`0`, so `true` never equals the text `"true"`.
/// - A number and a string are compared numerically after trimming the
///   string; an empty string counts as `0` and unparsable text is unequal.
/// - Two strings must match exactly.
/// - An array compared with a primitive is rendered as its comma-joined
///   element text first. Objects never equal primitives.
pub fn loose_equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(flag), other) => loose_equals(&bool_as_number(*flag), other),
        (other, Value::Bool(flag)) => loose_equals(other, &bool_as_number(*flag)),
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        (Value::Number(number), Value::String(text)) | (Value::String(text), Value::Number(number)) => {
            match (number.as_f64(), parse_loose_number(text)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Array(items), primitive @ (Value::String(_) | Value::Number(_)))
        | (primitive @ (Value::String(_) | Value::Number(_)), Value::Array(items)) => {
            loose_equals(&Value::String(join_elements(items)), primitive)
        }
        _ => false,
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn as_structured(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        Value::String(text) => {
            let trimmed = text.trim_start();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return None;
            }
            serde_json::from_str::<Value>(text).ok().filter(is_structured)
        }
        _ => None,
    }
}

fn bool_as_number(flag: bool) -> Value {
    Value::from(u8::from(flag))
}

fn parse_loose_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Arrays render comma-joined here, the same way loose equality sees them.
fn render_for_match(actual: &Value) -> String {
    match actual {
        Value::Array(items) => join_elements(items),
        other => stringify_value(other),
    }
}

fn join_elements(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Null => String::new(),
            other => stringify_value(other),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn equal(actual: Value, expected: Value) -> bool {
        compare_values(&actual, &expected).expect("comparison")
    }

    #[test]
    fn regex_prefix_matches_rendered_actual() {
        assert!(equal(json!("user-123"), json!("regex:^user-\\d+$")));
        assert!(equal(json!(201), json!("regex:^2\\d\\d$")));
        assert!(!equal(json!("admin"), json!("regex:^user")));
    }

    #[test]
    fn digits_only_pattern() {
        assert!(equal(json!("42"), json!(r"regex:^\d+$")));
        assert!(!equal(json!("4a2"), json!(r"regex:^\d+$")));
    }

    #[test]
    fn regex_sees_arrays_comma_joined() {
        assert!(equal(json!(["a", "b"]), json!("regex:^a,b$")));
        assert!(!equal(json!(["a", "b"]), json!(r#"regex:^\["a""#)));
    }

    #[test]
    fn invalid_regex_is_a_fault() {
        let error = compare_values(&json!("x"), &json!("regex:(")).expect_err("invalid");
        assert!(matches!(error, AssertionError::InvalidRegex { .. }));
    }

    #[test]
    fn structured_values_ignore_key_order() {
        assert!(equal(json!({"a": 1, "b": [1, 2]}), json!(r#"{"b":[1,2],"a":1}"#)));
        assert!(equal(json!({"a": {"c": 3, "b": 2}}), json!({"a": {"b": 2, "c": 3}})));
        assert!(!equal(json!([1, 2]), json!("[2,1]")));
    }

    #[test]
    fn structured_numbers_compare_by_value() {
        assert!(equal(json!([{"score": 3.0}]), json!(r#"[{"score":3}]"#)));
        assert!(equal(json!([{"id": 1}]), json!(r#"[{"id":1.0}]"#)));
        assert!(!equal(json!([{"score": 3.5}]), json!(r#"[{"score":3}]"#)));
    }

    #[test]
    fn loose_equality_table() {
        assert!(equal(json!(false), json!("0")));
        assert!(equal(json!(true), json!(1)));
        assert!(equal(json!(false), json!(0)));
        assert!(!equal(json!(true), json!("true")));
        assert!(!equal(json!(false), json!("false")));
        assert!(equal(json!(1), json!("1.0")));
        assert!(equal(json!(200), json!(" 200 ")));
        assert!(equal(json!(0), json!("")));
        assert!(equal(json!("abc"), json!("abc")));
        assert!(equal(Value::Null, Value::Null));

        assert!(!equal(Value::Null, json!("")));
        assert!(!equal(json!(""), Value::Null));
        assert!(!equal(json!(0), Value::Null));
        assert!(!equal(json!(1), json!("one")));
        assert!(!equal(json!("abc"), json!("ABC")));
        assert!(!equal(json!({"a": 1}), json!("a")));
    }

    #[test]
    fn arrays_compare_to_primitives_by_joined_text() {
        assert!(equal(json!(["a", "b"]), json!("a,b")));
        assert!(equal(json!([5]), json!(5)));
        assert!(!equal(json!(["a", "b"]), json!("a, b")));
    }
}
