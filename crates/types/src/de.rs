//! Lenient deserializers for values coming out of tabular sources.
//!
//! Spreadsheet and CSV exports rarely preserve types: flags arrive as `"Yes"`,
//! status codes as `"200"`, and empty cells as `""`. These helpers accept the
//! common spellings so records can be loaded from YAML, JSON, or converted sheets.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept `true`/`false`, `yes`/`no`, `y`/`n`, `1`/`0` (any case) or a JSON boolean/number.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::Null => Ok(false),
        Value::Number(number) => Ok(number.as_f64().map(|n| n != 0.0).unwrap_or(false)),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(true),
            "false" | "no" | "n" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean flag, got '{other}'"))),
        },
        other => Err(D::Error::custom(format!("expected a boolean flag, got {other}"))),
    }
}

/// Text cell that treats empty or whitespace-only content as absent.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(scalar_to_text).map(|text| text.trim().to_string()).filter(|text| !text.is_empty()))
}

/// Text cell that accepts numbers and booleans, rendering them as text.
pub fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(_) | Value::Object(_) => Err(D::Error::custom("expected a scalar value")),
        other => Ok(scalar_to_text(other)),
    }
}

/// Template cell that accepts either raw text or an inline JSON structure.
///
/// Inline structures are serialized back to compact JSON text so they flow
/// through the same substitution path as text templates.
pub fn template_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => serde_json::to_string(&other).map_err(D::Error::custom),
    }
}

/// Identifier list given either as a sequence or as a comma-separated string.
pub fn reference_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .map(scalar_to_text)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()),
        Value::Object(_) => Err(D::Error::custom("expected a list of identifiers")),
        other => Ok(crate::split_reference_list(&scalar_to_text(other))
            .into_iter()
            .map(str::to_string)
            .collect()),
    }
}

/// HTTP status code given as a number or numeric text. Empty cells fall back to 200.
pub fn status_code<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(crate::suite::DEFAULT_EXPECTED_STATUS),
        Value::Number(number) => number
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid status code {number}"))),
        Value::String(text) if text.trim().is_empty() => Ok(crate::suite::DEFAULT_EXPECTED_STATUS),
        Value::String(text) => {
            let trimmed = text.trim();
            // Sheets exported as floats render "200.0".
            let integral = trimmed.strip_suffix(".0").unwrap_or(trimmed);
            integral
                .parse::<u16>()
                .map_err(|_| D::Error::custom(format!("invalid status code '{trimmed}'")))
        }
        other => Err(D::Error::custom(format!("invalid status code {other}"))),
    }
}

fn scalar_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
