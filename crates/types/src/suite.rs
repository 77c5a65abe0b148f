//! Declarative suite records.
//!
//! A suite is six ordered collections loaded from a data source. Records are
//! read-only once loaded; the engine looks them up by identifier and never
//! mutates them. Field names accept both the snake_case spelling used in YAML
//! documents and the camelCase column headers used by spreadsheet exports.

pub mod validation;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::de::{flexible_bool, optional_text, reference_list, scalar_text, status_code, template_text};
use crate::split_reference_list;

/// Expected status applied when a step leaves the column empty.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

fn default_true() -> bool {
    true
}

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

/// A named, ordered group of steps with an optional prerequisite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    #[serde(alias = "testCaseID", alias = "testCaseId", deserialize_with = "scalar_text")]
    pub id: String,
    #[serde(default, alias = "testCaseName")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Disabled cases are reported as skipped without running any step.
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub execute: bool,
    /// Identifier of a case that must run first (one hop only).
    #[serde(default, alias = "prerequisites", deserialize_with = "optional_text")]
    pub prerequisite: Option<String>,
    /// Step identifiers in execution order.
    #[serde(default, alias = "testSteps", alias = "stepIDs", deserialize_with = "reference_list")]
    pub steps: Vec<String>,
}

/// One HTTP call plus its extraction rules and checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestStep {
    #[serde(alias = "stepID", alias = "stepId", deserialize_with = "scalar_text")]
    pub id: String,
    #[serde(default, alias = "apiName", deserialize_with = "optional_text")]
    pub api_name: Option<String>,
    pub method: String,
    /// Endpoint template; may be relative to the base URL or absolute.
    pub endpoint: String,
    /// Comma-separated header group identifiers.
    #[serde(default, alias = "headersID", alias = "headerIDs", deserialize_with = "optional_text")]
    pub headers: Option<String>,
    /// Body template identifier.
    #[serde(default, alias = "bodyID", alias = "bodyId", deserialize_with = "optional_text")]
    pub body: Option<String>,
    /// Comma-separated `name=jsonpath` extraction rules.
    #[serde(default, alias = "extractVars", deserialize_with = "optional_text")]
    pub extract_vars: Option<String>,
    #[serde(
        default = "default_expected_status",
        alias = "expectedStatus",
        deserialize_with = "status_code"
    )]
    pub expected_status: u16,
    /// Comma-separated assertion identifiers.
    #[serde(default, alias = "assertionIDs", alias = "assertionIds", deserialize_with = "optional_text")]
    pub assertions: Option<String>,
    #[serde(default, alias = "saveResponse", deserialize_with = "flexible_bool")]
    pub save_response: bool,
}

impl TestStep {
    /// Header group identifiers referenced by this step.
    pub fn header_ids(&self) -> Vec<&str> {
        self.headers.as_deref().map(split_reference_list).unwrap_or_default()
    }

    /// Assertion identifiers referenced by this step.
    pub fn assertion_ids(&self) -> Vec<&str> {
        self.assertions.as_deref().map(split_reference_list).unwrap_or_default()
    }

    /// Label used in logs: the API name when present, otherwise the step id.
    pub fn label(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.id)
    }
}

/// A declarative check evaluated against a step's response or an external backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assertion {
    #[serde(alias = "assertionID", alias = "assertionId", deserialize_with = "scalar_text")]
    pub id: String,
    /// Raw validation tag; parsed with [`Assertion::kind`] at evaluation time.
    #[serde(alias = "validationType", alias = "type")]
    pub validation_type: String,
    /// Expression whose meaning depends on the validation kind
    /// (JSONPath, property name, SQL, search query, or schema document).
    #[serde(default, alias = "actualValue", deserialize_with = "template_text")]
    pub actual: String,
    #[serde(default, alias = "expectedValue", deserialize_with = "template_text")]
    pub expected: String,
}

impl Assertion {
    pub fn kind(&self) -> Result<ValidationKind, UnknownValidationKind> {
        self.validation_type.parse()
    }
}

/// One header row. Rows sharing an `id` form a header group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    #[serde(alias = "headerID", alias = "headerId", deserialize_with = "scalar_text")]
    pub id: String,
    pub key: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub value: String,
}

/// A JSON body template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(alias = "bodyID", alias = "bodyId", deserialize_with = "scalar_text")]
    pub id: String,
    #[serde(alias = "jsonTemplate", alias = "template", deserialize_with = "template_text")]
    pub json_template: String,
}

/// Seed value for a test-case-scoped variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestData {
    #[serde(alias = "testCaseID", alias = "testCaseId", deserialize_with = "scalar_text")]
    pub test_case_id: String,
    #[serde(alias = "varName", alias = "variable")]
    pub var_name: String,
    #[serde(default)]
    pub value: Value,
}

/// The full set of records a data source provides, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestSuite {
    #[serde(default, alias = "testCases")]
    pub test_cases: Vec<TestCase>,
    #[serde(default, alias = "testSteps")]
    pub test_steps: Vec<TestStep>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub bodies: Vec<Body>,
    #[serde(default, alias = "testData")]
    pub test_data: Vec<TestData>,
}

impl TestSuite {
    pub fn test_case(&self, id: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|case| case.id == id)
    }

    pub fn step(&self, id: &str) -> Option<&TestStep> {
        self.test_steps.iter().find(|step| step.id == id)
    }

    pub fn assertion(&self, id: &str) -> Option<&Assertion> {
        self.assertions.iter().find(|assertion| assertion.id == id)
    }

    pub fn body(&self, id: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.id == id)
    }

    /// Header rows belonging to any of the given group ids, in declaration order
    /// per group. Unknown group ids contribute nothing.
    pub fn header_rows<'a>(&'a self, group_ids: &[&str]) -> Vec<&'a Header> {
        group_ids
            .iter()
            .flat_map(|group| self.headers.iter().filter(move |header| header.id == *group))
            .collect()
    }

    /// Seed rows for one test case, in declaration order.
    pub fn test_data_for<'a>(&'a self, test_case_id: &'a str) -> impl Iterator<Item = &'a TestData> + 'a {
        self.test_data.iter().filter(move |row| row.test_case_id == test_case_id)
    }

    /// Check structural invariants that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<(), validation::SuiteValidationError> {
        validation::validate_suite(self)
    }
}

/// Closed set of validation backends an assertion can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationKind {
    ResponseBody,
    ResponseMetadata,
    Database,
    SearchIndex,
    JsonSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown validation type '{0}'")]
pub struct UnknownValidationKind(pub String);

impl FromStr for ValidationKind {
    type Err = UnknownValidationKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "responsebody" => Ok(Self::ResponseBody),
            "responsemetadata" | "responsemetatype" => Ok(Self::ResponseMetadata),
            "database" | "db" => Ok(Self::Database),
            "searchindex" | "kibana" | "elasticsearch" => Ok(Self::SearchIndex),
            "jsonschema" => Ok(Self::JsonSchema),
            _ => Err(UnknownValidationKind(raw.to_string())),
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::ResponseBody => "response-body",
            Self::ResponseMetadata => "response-metadata",
            Self::Database => "database",
            Self::SearchIndex => "search-index",
            Self::JsonSchema => "json-schema",
        };
        f.write_str(tag)
    }
}
