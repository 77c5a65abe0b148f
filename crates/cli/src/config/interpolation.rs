//! `${env:NAME}` placeholders in config string values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w.-]+)\}").expect("valid env placeholder pattern"));

#[derive(Debug, Error, PartialEq)]
pub enum InterpolationError {
    #[error("environment variable not set: {name}")]
    MissingEnvVar { name: String },
}

/// Interpolate every string in a raw config document, including nested
/// objects and arrays. Keys are left alone.
pub fn interpolate_value(value: &mut Value) -> Result<(), InterpolationError> {
    match value {
        Value::String(text) => {
            *text = interpolate_string(text)?;
        }
        Value::Array(items) => {
            for item in items {
                interpolate_value(item)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                interpolate_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace each `${env:NAME}` with the variable's value. Unset variables are errors.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let mut resolved = Vec::new();
    for cap in ENV_PLACEHOLDER.captures_iter(value) {
        let var_name = cap[1].to_string();
        let env_value =
            std::env::var(&var_name).map_err(|_| InterpolationError::MissingEnvVar { name: var_name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", var_name);
        resolved.push((cap[0].to_string(), env_value));
    }

    let mut result = value.to_string();
    for (placeholder, env_value) in resolved {
        result = result.replace(&placeholder, &env_value);
    }
    Ok(result)
}
