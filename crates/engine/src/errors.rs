//! Error types raised by the engine.
//!
//! Only [`SuiteError`] is fatal to a run. The others are captured at their
//! boundary: assertion faults become failed assertion results, step faults
//! become failed step results, and case faults fail a single test case.

use std::path::PathBuf;

use apirig_types::{SuiteValidationError, UnknownValidationKind, ValidationKind};
use apirig_util::JsonPathError;
use thiserror::Error;

/// Errors raised while looking up or producing a variable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("variable not found: {name}")]
    NotFound { name: String },

    #[error("generator {name} failed: {reason}")]
    Generator { name: String, reason: String },
}

/// Faults raised while evaluating a single assertion.
#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("{kind} backend is not configured")]
    BackendNotConfigured { kind: ValidationKind },

    #[error(transparent)]
    UnknownValidationKind(#[from] UnknownValidationKind),

    #[error(transparent)]
    InvalidJsonPath(#[from] JsonPathError),

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid JSON schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("invalid search query: {reason}")]
    InvalidQuery { reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Faults that fail a single step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("body template not found: {id}")]
    TemplateNotFound { id: String },

    #[error("body template {id} is not valid JSON after substitution: {reason}")]
    InvalidBodyTemplate { id: String, reason: String },

    #[error("invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    #[error(transparent)]
    Request(#[from] ClientError),

    #[error("expected status {expected}, got {actual}")]
    StatusMismatch { expected: u16, actual: u16 },

    #[error("assertions failed: {}", assertion_ids.join(", "))]
    AssertionsFailed { assertion_ids: Vec<String> },
}

/// Orchestration faults that fail a whole test case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseError {
    #[error("test step not found: {step_id} (referenced by test case {test_case})")]
    StepNotFound { test_case: String, step_id: String },
}

/// Errors returned by a request client. Non-2xx responses are not errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Errors returned by database and search backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend connection failed: {message}")]
    Connection { message: String },

    #[error("database query failed: {message}")]
    Query { message: String },

    #[error("search request failed: {message}")]
    Search { message: String },
}

/// Errors raised while loading a suite. These abort the run.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("failed to read suite file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse suite file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid suite: {0}")]
    Invalid(#[from] SuiteValidationError),
}
