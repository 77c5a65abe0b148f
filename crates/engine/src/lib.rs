//! # Apirig Engine
//!
//! The engine runs data-driven API test suites. Test cases, steps, headers,
//! bodies, assertions, and test data are declared as records; the engine
//! resolves variable references, sends HTTP requests, and validates the
//! responses.
//!
//! ## Usage
//!
//! ```rust
//! use apirig_engine::load_suite_file;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let suite_path = temp_dir.path().join("suite.yaml");
//! std::fs::write(&suite_path, r#"
//! testCases:
//!   - id: TC1
//!     steps: [S1]
//! testSteps:
//!   - id: S1
//!     method: GET
//!     endpoint: /health
//! "#)?;
//!
//! let suite = load_suite_file(&suite_path)?;
//! assert_eq!(suite.test_cases.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`variables`**: scoped variables and `{{name}}` substitution
//! - **`assertions`**: assertion evaluation and the database/search backends
//! - **`executor`**: test case and step orchestration over a `RequestClient`
//! - **`errors`**: error types for each of the above

use std::{fs, path::Path};

use apirig_types::TestSuite;

pub mod assertions;
pub mod errors;
pub mod executor;
pub mod variables;

pub use assertions::{
    AssertionEngine, DatabaseBackend, ElasticsearchBackend, ResponseSnapshot, SearchBackend, SqliteBackend, compare_values,
};
pub use errors::{AssertionError, BackendError, CaseError, ClientError, StepError, SuiteError, VariableError};
pub use executor::{Executor, HttpRequest, HttpRequestClient, HttpResponse, RequestClient};
pub use variables::{Generator, VariableManager, VariableValue};

/// Load a suite document from YAML or JSON.
///
/// Top-level keys are the six collections (`testCases`, `testSteps`,
/// `assertions`, `headers`, `bodies`, `testData`; snake_case also accepted).
/// Missing collections are empty. The suite is not validated here; call
/// [`TestSuite::validate`] for that.
pub fn load_suite_file(file_path: impl AsRef<Path>) -> Result<TestSuite, SuiteError> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).map_err(|source| SuiteError::Read {
        path: file_path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(TestSuite::default());
    }

    serde_yaml::from_str::<TestSuite>(&content).map_err(|source| SuiteError::Parse {
        path: file_path.to_path_buf(),
        source,
    })
}

/// Load a suite document and check its structure before anything runs.
pub fn load_validated_suite(file_path: impl AsRef<Path>) -> Result<TestSuite, SuiteError> {
    let suite = load_suite_file(file_path)?;
    suite.validate()?;
    Ok(suite)
}
