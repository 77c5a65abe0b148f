//! Assertion evaluation across response, database, search, and schema backends.
//!
//! [`AssertionEngine::validate`] never fails: any fault while evaluating an
//! assertion is folded into a failed [`AssertionResult`] carrying the error
//! message, so one broken assertion cannot abort a step.

use std::sync::Arc;

use apirig_types::{Assertion, AssertionResult, AssertionStatus, ValidationKind};
use apirig_util::select_first;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AssertionError;
use crate::variables::VariableManager;

pub mod backends;
pub mod compare;

pub use backends::{DatabaseBackend, ElasticsearchBackend, SearchBackend, SqliteBackend};
pub use compare::compare_values;

const SCHEMA_EXPECTED: &str = "JSON Schema validation";
const FAULT_ACTUAL: &str = "Error during validation";

/// The parts of an HTTP response assertions can inspect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

impl ResponseSnapshot {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of a successful evaluation, before it is turned into a result record.
struct Evaluation {
    passed: bool,
    expected: Value,
    actual: Value,
}

#[derive(Clone, Default)]
pub struct AssertionEngine {
    database: Option<Arc<dyn DatabaseBackend>>,
    search: Option<Arc<dyn SearchBackend>>,
}

impl AssertionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, backend: Arc<dyn DatabaseBackend>) -> Self {
        self.database = Some(backend);
        self
    }

    pub fn with_search(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    /// Evaluate one assertion against a response.
    pub async fn validate(
        &self,
        assertion: &Assertion,
        response: &ResponseSnapshot,
        variables: &VariableManager,
    ) -> AssertionResult {
        match self.evaluate(assertion, response, variables).await {
            Ok(evaluation) => {
                let status = if evaluation.passed {
                    AssertionStatus::Passed
                } else {
                    AssertionStatus::Failed
                };
                debug!(assertion = %assertion.id, ?status, "assertion evaluated");
                AssertionResult {
                    assertion_id: assertion.id.clone(),
                    status,
                    expected: evaluation.expected,
                    actual: evaluation.actual,
                    error: None,
                }
            }
            Err(error) => {
                warn!(assertion = %assertion.id, error = %error, "assertion could not be evaluated");
                AssertionResult {
                    assertion_id: assertion.id.clone(),
                    status: AssertionStatus::Failed,
                    expected: Value::String(assertion.expected.clone()),
                    actual: Value::String(FAULT_ACTUAL.to_string()),
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn evaluate(
        &self,
        assertion: &Assertion,
        response: &ResponseSnapshot,
        variables: &VariableManager,
    ) -> Result<Evaluation, AssertionError> {
        let kind = assertion.kind()?;
        let actual_expression = variables.substitute(&assertion.actual);

        let actual = match kind {
            ValidationKind::JsonSchema => return validate_schema(&actual_expression, &response.body),
            ValidationKind::ResponseBody => select_first(&response.body, &actual_expression)?.unwrap_or(Value::Null),
            ValidationKind::ResponseMetadata => metadata_value(response, actual_expression.trim()),
            ValidationKind::Database => {
                let backend = self
                    .database
                    .as_ref()
                    .ok_or(AssertionError::BackendNotConfigured { kind })?;
                Value::Array(backend.query(&actual_expression).await?)
            }
            ValidationKind::SearchIndex => {
                let backend = self.search.as_ref().ok_or(AssertionError::BackendNotConfigured { kind })?;
                let query: Value = serde_json::from_str(&actual_expression).map_err(|error| AssertionError::InvalidQuery {
                    reason: error.to_string(),
                })?;
                Value::Array(backend.search(&query).await?)
            }
        };

        let expected = Value::String(variables.substitute(&assertion.expected));
        let passed = compare_values(&actual, &expected)?;
        Ok(Evaluation {
            passed,
            expected,
            actual,
        })
    }
}

/// Status first, then a header (case-insensitive), then a top-level body field.
fn metadata_value(response: &ResponseSnapshot, property: &str) -> Value {
    if property.eq_ignore_ascii_case("status") || property.eq_ignore_ascii_case("statusCode") {
        return Value::from(response.status);
    }
    if let Some(header) = response.header(property) {
        return Value::String(header.to_string());
    }
    response.body.get(property).cloned().unwrap_or(Value::Null)
}

fn validate_schema(schema_text: &str, body: &Value) -> Result<Evaluation, AssertionError> {
    let schema: Value = serde_json::from_str(schema_text).map_err(|error| AssertionError::InvalidSchema {
        reason: error.to_string(),
    })?;
    let validator = jsonschema::validator_for(&schema).map_err(|error| AssertionError::InvalidSchema {
        reason: error.to_string(),
    })?;
    let violations: Vec<String> = validator.iter_errors(body).map(|error| error.to_string()).collect();

    let actual = if violations.is_empty() {
        "Valid".to_string()
    } else {
        format!("Invalid: {}", violations.join("; "))
    };
    Ok(Evaluation {
        passed: violations.is_empty(),
        expected: Value::String(SCHEMA_EXPECTED.to_string()),
        actual: Value::String(actual),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackendError;
    use serde_json::json;

    fn assertion(kind: &str, actual: &str, expected: &str) -> Assertion {
        Assertion {
            id: "A1".to_string(),
            validation_type: kind.to_string(),
            actual: actual.to_string(),
            expected: expected.to_string(),
        }
    }

    fn response() -> ResponseSnapshot {
        let mut headers = IndexMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        ResponseSnapshot {
            status: 201,
            headers,
            body: json!({"id": 7, "name": "Jane", "roles": ["admin", "dev"], "active": true}),
        }
    }

    struct FixedRows(Vec<Value>);

    #[async_trait::async_trait]
    impl DatabaseBackend for FixedRows {
        async fn query(&self, sql: &str) -> Result<Vec<Value>, BackendError> {
            if sql.contains("boom") {
                return Err(BackendError::Query {
                    message: "syntax error".to_string(),
                });
            }
            Ok(self.0.clone())
        }
    }

    struct FixedHits;

    #[async_trait::async_trait]
    impl SearchBackend for FixedHits {
        async fn search(&self, query: &Value) -> Result<Vec<Value>, BackendError> {
            Ok(vec![json!({"_source": query.clone()})])
        }
    }

    #[tokio::test]
    async fn response_body_uses_json_path_and_substitution() {
        let engine = AssertionEngine::new();
        let mut variables = VariableManager::new();
        variables.set_test_case_var("expectedName", "Jane");

        let result = engine
            .validate(&assertion("response-body", "$.name", "{{expectedName}}"), &response(), &variables)
            .await;
        assert!(result.is_passed());
        assert_eq!(result.actual, json!("Jane"));
        assert_eq!(result.expected, json!("Jane"));

        let result = engine
            .validate(&assertion("responseBody", "$.roles", "admin,dev"), &response(), &variables)
            .await;
        assert!(result.is_passed());
    }

    #[tokio::test]
    async fn missing_body_path_compares_as_null() {
        let engine = AssertionEngine::new();
        let variables = VariableManager::new();
        let result = engine
            .validate(&assertion("response-body", "$.missing", ""), &response(), &variables)
            .await;
        assert_eq!(result.status, AssertionStatus::Failed);
        assert_eq!(result.actual, Value::Null);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn metadata_checks_status_then_headers_then_body() {
        let engine = AssertionEngine::new();
        let variables = VariableManager::new();
        let status = engine
            .validate(&assertion("ResponseMetaType", "statusCode", "201"), &response(), &variables)
            .await;
        assert!(status.is_passed());
        assert_eq!(status.actual, json!(201));

        let header = engine
            .validate(&assertion("response-metadata", "Content-Type", "application/json"), &response(), &variables)
            .await;
        assert!(header.is_passed());

        let field = engine
            .validate(&assertion("response-metadata", "active", "1"), &response(), &variables)
            .await;
        assert!(field.is_passed());

        let bool_text = engine
            .validate(&assertion("response-metadata", "active", "true"), &response(), &variables)
            .await;
        assert!(!bool_text.is_passed());
    }

    #[tokio::test]
    async fn response_body_expected_uses_step_variable() {
        let engine = AssertionEngine::new();
        let mut variables = VariableManager::new();
        variables.set_step_var("userId", "42");
        let snapshot = ResponseSnapshot {
            status: 200,
            headers: IndexMap::new(),
            body: json!({"user": {"id": "42"}}),
        };

        let result = engine
            .validate(&assertion("response-body", "$.user.id", "{{userId}}"), &snapshot, &variables)
            .await;
        assert!(result.is_passed());
        assert_eq!(result.expected, json!("42"));
        assert_eq!(result.actual, json!("42"));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn json_schema_reports_valid_and_invalid() {
        let engine = AssertionEngine::new();
        let variables = VariableManager::new();
        let schema = r#"{"type":"object","required":["id","name"],"properties":{"id":{"type":"integer"}}}"#;
        let result = engine
            .validate(&assertion("json-schema", schema, ""), &response(), &variables)
            .await;
        assert!(result.is_passed());
        assert_eq!(result.expected, json!("JSON Schema validation"));
        assert_eq!(result.actual, json!("Valid"));

        let strict = r#"{"type":"object","properties":{"id":{"type":"string"}}}"#;
        let result = engine
            .validate(&assertion("jsonSchema", strict, ""), &response(), &variables)
            .await;
        assert_eq!(result.status, AssertionStatus::Failed);
        let actual = result.actual.as_str().expect("text");
        assert!(actual.starts_with("Invalid: "), "{actual}");
    }

    #[tokio::test]
    async fn faults_become_failed_results() {
        let engine = AssertionEngine::new();
        let variables = VariableManager::new();
        let cases = [
            assertion("graphql", "$.id", "7"),
            assertion("response-body", "$[?(", "7"),
            assertion("response-body", "$.id", "regex:("),
            assertion("json-schema", "not json", ""),
            assertion("database", "SELECT 1", "1"),
            assertion("search-index", "{}", "[]"),
        ];
        for case in cases {
            let result = engine.validate(&case, &response(), &variables).await;
            assert_eq!(result.status, AssertionStatus::Failed, "{}", case.validation_type);
            assert_eq!(result.actual, json!("Error during validation"));
            assert_eq!(result.expected, json!(case.expected));
            assert!(result.error.is_some());
        }
    }

    #[tokio::test]
    async fn unconfigured_backend_names_the_kind() {
        let engine = AssertionEngine::new();
        let result = engine
            .validate(&assertion("database", "SELECT 1", "1"), &response(), &VariableManager::new())
            .await;
        assert_eq!(result.error.as_deref(), Some("database backend is not configured"));
    }

    #[tokio::test]
    async fn database_rows_compare_structurally() {
        let engine = AssertionEngine::new().with_database(Arc::new(FixedRows(vec![json!({"id": 7, "email": "j@x.io"})])));
        let mut variables = VariableManager::new();
        variables.set_step_var("userId", json!(7));

        let result = engine
            .validate(
                &assertion("database", "SELECT id, email FROM users WHERE id = {{userId}}", r#"[{"email":"j@x.io","id":7}]"#),
                &response(),
                &variables,
            )
            .await;
        assert!(result.is_passed(), "{result:?}");

        let result = engine
            .validate(&assertion("database", "boom", "[]"), &response(), &variables)
            .await;
        assert_eq!(result.error.as_deref(), Some("database query failed: syntax error"));
    }

    #[tokio::test]
    async fn search_queries_are_parsed_before_dispatch() {
        let engine = AssertionEngine::new().with_search(Arc::new(FixedHits));
        let variables = VariableManager::new();
        let result = engine
            .validate(
                &assertion("Kibana", r#"{"size":1}"#, r#"[{"_source":{"size":1}}]"#),
                &response(),
                &variables,
            )
            .await;
        assert!(result.is_passed(), "{result:?}");

        let result = engine
            .validate(&assertion("elasticsearch", "size=1", "[]"), &response(), &variables)
            .await;
        assert!(result.error.expect("fault").starts_with("invalid search query"));
    }
}
