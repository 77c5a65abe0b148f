//! Structural checks over a loaded suite.
//!
//! These routines catch authoring mistakes before any request is sent:
//! duplicate case identifiers, prerequisites that point nowhere, and
//! prerequisite chains that loop back on themselves.

use std::collections::HashSet;

use thiserror::Error;

use super::TestSuite;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuiteValidationError {
    #[error("test case '{id}' is declared more than once")]
    DuplicateTestCase { id: String },
    #[error("test case '{test_case}' names itself as prerequisite")]
    SelfPrerequisite { test_case: String },
    #[error("test case '{test_case}' references unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite { test_case: String, prerequisite: String },
    #[error("prerequisite cycle detected: {path}")]
    PrerequisiteCycle { path: String },
}

pub fn validate_suite(suite: &TestSuite) -> Result<(), SuiteValidationError> {
    let mut seen = HashSet::new();
    for case in &suite.test_cases {
        if !seen.insert(case.id.as_str()) {
            return Err(SuiteValidationError::DuplicateTestCase { id: case.id.clone() });
        }
    }

    for case in &suite.test_cases {
        let Some(prerequisite) = case.prerequisite.as_deref() else {
            continue;
        };
        if prerequisite == case.id {
            return Err(SuiteValidationError::SelfPrerequisite {
                test_case: case.id.clone(),
            });
        }
        if !seen.contains(prerequisite) {
            return Err(SuiteValidationError::UnknownPrerequisite {
                test_case: case.id.clone(),
                prerequisite: prerequisite.to_string(),
            });
        }
    }

    detect_cycles(suite)
}

/// Each case has at most one prerequisite, so every chain is a simple walk.
fn detect_cycles(suite: &TestSuite) -> Result<(), SuiteValidationError> {
    for case in &suite.test_cases {
        let mut path = vec![case.id.as_str()];
        let mut current = case;
        while let Some(next_id) = current.prerequisite.as_deref() {
            if let Some(position) = path.iter().position(|id| *id == next_id) {
                let mut cycle: Vec<&str> = path[position..].to_vec();
                cycle.push(next_id);
                return Err(SuiteValidationError::PrerequisiteCycle { path: cycle.join(" -> ") });
            }
            let Some(next) = suite.test_case(next_id) else {
                break;
            };
            path.push(next_id);
            current = next;
        }
    }
    Ok(())
}
