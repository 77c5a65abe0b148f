//! Single-step execution.

use std::time::Instant;

use apirig_types::{StepResult, TestStatus, TestStep, TestSuite};
use apirig_util::redact_header_value;
use tracing::{debug, error, info};

use super::prepare::{echo_request, prepare_request};
use super::runner::RequestClient;
use crate::assertions::AssertionEngine;
use crate::errors::StepError;
use crate::variables::VariableManager;

/// Execute one step: prepare, send, extract, check status, then run assertions.
///
/// Never returns an error; every fault is recorded on the returned
/// [`StepResult`]. The step scope is cleared before anything else happens.
pub async fn run_step_with(
    step: &TestStep,
    suite: &TestSuite,
    client: &dyn RequestClient,
    assertions: &AssertionEngine,
    variables: &mut VariableManager,
) -> StepResult {
    let start = Instant::now();
    variables.clear_step_scope();

    let request = match prepare_request(suite, step, variables) {
        Ok(request) => request,
        Err(fault) => return fail(step, None, fault, start),
    };
    let mut echo = echo_request(&request);
    debug!(
        step = %step.id,
        method = %echo.method,
        endpoint = %echo.url,
        headers = ?echo
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {}", redact_header_value(name, value)))
            .collect::<Vec<_>>(),
        "step request prepared"
    );

    let response = match client.send(request).await {
        Ok(response) => response,
        Err(fault) => return fail(step, Some(echo), StepError::Request(fault), start),
    };
    echo.url = response.url.clone();

    if let Some(rules) = step.extract_vars.as_deref() {
        variables.extract_from_response(&response.body, rules);
    }

    let saved_response = step.save_response.then(|| response.body.clone());
    if response.status != step.expected_status {
        let fault = StepError::StatusMismatch {
            expected: step.expected_status,
            actual: response.status,
        };
        let mut result = fail(step, Some(echo), fault, start);
        result.response = saved_response;
        return result;
    }

    let snapshot = response.snapshot();
    let mut assertion_results = Vec::new();
    for assertion_id in step.assertion_ids() {
        let Some(assertion) = suite.assertion(assertion_id) else {
            debug!(step = %step.id, assertion = %assertion_id, "assertion not found; skipping");
            continue;
        };
        assertion_results.push(assertions.validate(assertion, &snapshot, variables).await);
    }

    let failed_ids: Vec<String> = assertion_results
        .iter()
        .filter(|result| !result.is_passed())
        .map(|result| result.assertion_id.clone())
        .collect();
    let (status, error) = if failed_ids.is_empty() {
        (TestStatus::Passed, None)
    } else {
        let fault = StepError::AssertionsFailed {
            assertion_ids: failed_ids,
        };
        error!(step = %step.id, error = %fault, "step failed");
        (TestStatus::Failed, Some(fault.to_string()))
    };

    let duration_ms = elapsed_ms(start);
    info!(step = %step.id, api = %step.label(), %status, duration_ms, "step finished");
    StepResult {
        step_id: step.id.clone(),
        status,
        request: Some(echo),
        response: saved_response,
        assertions: assertion_results,
        error,
        duration_ms,
    }
}

fn fail(step: &TestStep, echo: Option<apirig_types::RequestEcho>, fault: StepError, start: Instant) -> StepResult {
    error!(step = %step.id, error = %fault, "step failed");
    let mut result = StepResult::failed(step.id.clone(), echo, fault.to_string());
    result.duration_ms = elapsed_ms(start);
    result
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
