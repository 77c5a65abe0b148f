//! Request preparation: header groups, body templates, and endpoint substitution.

use apirig_types::{RequestEcho, TestStep, TestSuite};
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::Value;

use super::runner::HttpRequest;
use crate::errors::StepError;
use crate::variables::VariableManager;

/// Build the request for `step` against the current variable state.
///
/// Header rows from every referenced group are applied in order, so a later
/// row with the same key overrides an earlier one. Unknown header groups add
/// nothing. An unknown body id is [`StepError::TemplateNotFound`]; a body
/// that is not JSON once substituted is [`StepError::InvalidBodyTemplate`].
pub fn prepare_request(suite: &TestSuite, step: &TestStep, variables: &VariableManager) -> Result<HttpRequest, StepError> {
    let method = parse_method(&step.method)?;

    let mut headers = IndexMap::new();
    for row in suite.header_rows(&step.header_ids()) {
        headers.insert(row.key.trim().to_string(), variables.substitute(&row.value));
    }

    let body = match step.body.as_deref() {
        Some(body_id) => {
            let template = suite.body(body_id).ok_or_else(|| StepError::TemplateNotFound {
                id: body_id.to_string(),
            })?;
            render_body(body_id, &variables.substitute(&template.json_template))?
        }
        None => None,
    };

    Ok(HttpRequest {
        method,
        url: variables.substitute(&step.endpoint),
        headers,
        body,
    })
}

/// Echo of a prepared request for step results.
pub fn echo_request(request: &HttpRequest) -> RequestEcho {
    RequestEcho {
        method: request.method.to_string(),
        url: request.url.clone(),
        headers: request.headers.clone(),
        body: request.body.clone(),
    }
}

fn parse_method(raw: &str) -> Result<Method, StepError> {
    let normalized = raw.trim().to_ascii_uppercase();
    match normalized.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS" => {
            Method::from_bytes(normalized.as_bytes()).map_err(|_| StepError::InvalidMethod {
                method: raw.to_string(),
            })
        }
        _ => Err(StepError::InvalidMethod {
            method: raw.to_string(),
        }),
    }
}

fn render_body(body_id: &str, rendered: &str) -> Result<Option<Value>, StepError> {
    if rendered.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(rendered)
        .map(Some)
        .map_err(|error| StepError::InvalidBodyTemplate {
            id: body_id.to_string(),
            reason: error.to_string(),
        })
}
