//! Shared record and result definitions for apirig.
//!
//! Records mirror the tabular collections a data source provides (test cases,
//! steps, assertions, headers, bodies, and test data). Results are produced by
//! the engine and consumed by report sinks.

pub mod de;
pub mod results;
pub mod suite;

pub use results::{AssertionResult, AssertionStatus, RequestEcho, RunSummary, StepResult, TestResult, TestStatus};
pub use suite::validation::SuiteValidationError;
pub use suite::{Assertion, Body, Header, TestCase, TestData, TestStep, TestSuite, UnknownValidationKind, ValidationKind};

/// Split a comma-separated reference list into trimmed, non-empty identifiers.
///
/// ```rust
/// use apirig_types::split_reference_list;
///
/// assert_eq!(split_reference_list(" A1, A2 ,,A3"), vec!["A1", "A2", "A3"]);
/// assert!(split_reference_list("  ").is_empty());
/// ```
pub fn split_reference_list(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty()).collect()
}
