//! JSONPath selection over response documents.

use serde_json::Value;
use thiserror::Error;

/// Raised when a JSONPath expression cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSONPath '{path}': {reason}")]
pub struct JsonPathError {
    pub path: String,
    pub reason: String,
}

/// Evaluate `path` against `document`, returning every match in document order.
pub fn select_all<'a>(document: &'a Value, path: &str) -> Result<Vec<&'a Value>, JsonPathError> {
    let trimmed = path.trim();
    jsonpath_lib::select(document, trimmed).map_err(|error| JsonPathError {
        path: trimmed.to_string(),
        reason: format!("{error:?}"),
    })
}

/// Evaluate `path` against `document` and return the first match, if any.
///
/// ```rust
/// use apirig_util::select_first;
/// use serde_json::json;
///
/// let body = json!({"users": [{"id": 7}, {"id": 9}]});
/// assert_eq!(select_first(&body, "$.users[*].id").unwrap(), Some(json!(7)));
/// assert_eq!(select_first(&body, "$.missing").unwrap(), None);
/// ```
pub fn select_first(document: &Value, path: &str) -> Result<Option<Value>, JsonPathError> {
    Ok(select_all(document, path)?.into_iter().next().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_field_is_selected() {
        let body = json!({"data": {"user": {"email": "jane@example.com"}}});
        assert_eq!(
            select_first(&body, " $.data.user.email ").expect("path"),
            Some(json!("jane@example.com"))
        );
    }

    #[test]
    fn null_match_is_still_a_match() {
        let body = json!({"deletedAt": null});
        assert_eq!(select_first(&body, "$.deletedAt").expect("path"), Some(Value::Null));
    }

    #[test]
    fn malformed_path_is_an_error() {
        let body = json!({});
        let error = select_first(&body, "$[?(").expect_err("invalid");
        assert_eq!(error.path, "$[?(");
    }
}
