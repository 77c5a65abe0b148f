//! Execution engine: runs test cases in declaration order, honouring one-hop
//! prerequisites, and steps within a case in order.
//!
//! - `prepare` resolves header groups, body templates and the endpoint
//! - `runner::RequestClient` abstracts how a request is sent
//! - `runner::HttpRequestClient` sends requests through `apirig_api::ApiClient`
//! - `step_once` runs a single step and never fails; faults land on the result

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use apirig_types::{StepResult, TestCase, TestResult, TestStatus, TestStep, TestSuite};
use tracing::{debug, error, info, warn};

use crate::assertions::AssertionEngine;
use crate::errors::CaseError;
use crate::variables::VariableManager;

pub mod prepare;
pub mod runner;
pub mod step_once;

pub use prepare::prepare_request;
pub use runner::{HttpRequest, HttpRequestClient, HttpResponse, RequestClient};
pub use step_once::run_step_with;

/// Drives a loaded suite. Owns the variable state for the whole run.
pub struct Executor {
    suite: Arc<TestSuite>,
    client: Arc<dyn RequestClient>,
    assertions: AssertionEngine,
    variables: VariableManager,
}

impl Executor {
    pub fn new(suite: TestSuite, client: Arc<dyn RequestClient>, assertions: AssertionEngine) -> Self {
        Self {
            suite: Arc::new(suite),
            client,
            assertions,
            variables: VariableManager::new(),
        }
    }

    pub fn suite(&self) -> &TestSuite {
        &self.suite
    }

    pub fn variables(&self) -> &VariableManager {
        &self.variables
    }

    /// Mutable access for seeding globals before a run.
    pub fn variables_mut(&mut self) -> &mut VariableManager {
        &mut self.variables
    }

    /// Run every test case in declaration order.
    ///
    /// Disabled cases are reported as skipped. A case whose prerequisite has
    /// not run yet gets the prerequisite run first (its own prerequisite is not
    /// followed, and it runs even when disabled). A case that already ran as a
    /// prerequisite still runs again in its own turn.
    pub async fn execute_all(&mut self) -> Vec<TestResult> {
        let suite = Arc::clone(&self.suite);
        let mut results = Vec::with_capacity(suite.test_cases.len());
        let mut executed: HashSet<String> = HashSet::new();

        for test_case in &suite.test_cases {
            if !test_case.execute {
                info!(test_case = %test_case.id, "test case disabled; skipping");
                results.push(TestResult::skipped(test_case.id.clone()));
                continue;
            }
            self.run_with_prerequisite(&suite, test_case, &mut executed, &mut results).await;
        }

        results
    }

    /// Run a single test case by id, with its prerequisite when it has one.
    ///
    /// Returns `None` when no case has that id. The case runs even when its
    /// `execute` flag is off, since it was asked for explicitly.
    pub async fn execute_test_case(&mut self, test_case_id: &str) -> Option<Vec<TestResult>> {
        let suite = Arc::clone(&self.suite);
        let test_case = suite.test_case(test_case_id)?;
        let mut results = Vec::new();
        let mut executed = HashSet::new();
        self.run_with_prerequisite(&suite, test_case, &mut executed, &mut results).await;
        Some(results)
    }

    /// Run one step against the current variable state.
    pub async fn execute_step(&mut self, step: &TestStep) -> StepResult {
        run_step_with(step, &self.suite, self.client.as_ref(), &self.assertions, &mut self.variables).await
    }

    async fn run_with_prerequisite(
        &mut self,
        suite: &TestSuite,
        test_case: &TestCase,
        executed: &mut HashSet<String>,
        results: &mut Vec<TestResult>,
    ) {
        if let Some(prerequisite_id) = test_case.prerequisite.as_deref()
            && !executed.contains(prerequisite_id)
        {
            match suite.test_case(prerequisite_id) {
                Some(prerequisite) => {
                    info!(test_case = %test_case.id, prerequisite = %prerequisite_id, "running prerequisite");
                    let result = self.run_test_case(suite, prerequisite).await;
                    results.push(result);
                    executed.insert(prerequisite.id.clone());
                }
                None => warn!(
                    test_case = %test_case.id,
                    prerequisite = %prerequisite_id,
                    "prerequisite not found; running without it"
                ),
            }
        }

        let result = self.run_test_case(suite, test_case).await;
        results.push(result);
        executed.insert(test_case.id.clone());
    }

    async fn run_test_case(&mut self, suite: &TestSuite, test_case: &TestCase) -> TestResult {
        let start = Instant::now();
        info!(test_case = %test_case.id, name = %test_case.name, "test case started");

        self.variables.clear_test_case_scope();
        for row in suite.test_data_for(&test_case.id) {
            self.variables.set_test_case_var(row.var_name.clone(), row.value.clone());
        }
        debug!(test_case = %test_case.id, variables = %self.variables.snapshot(), "test case variables seeded");

        let mut steps = Vec::with_capacity(test_case.steps.len());
        let mut status = TestStatus::Passed;
        let mut failure = None;

        for step_id in &test_case.steps {
            let Some(step) = suite.step(step_id) else {
                let fault = CaseError::StepNotFound {
                    test_case: test_case.id.clone(),
                    step_id: step_id.clone(),
                };
                error!(test_case = %test_case.id, error = %fault, "test case aborted");
                status = TestStatus::Failed;
                failure = Some(fault.to_string());
                break;
            };

            let step_result = run_step_with(step, suite, self.client.as_ref(), &self.assertions, &mut self.variables).await;
            let step_failed = step_result.is_failed();
            let step_error = step_result.error.clone();
            steps.push(step_result);
            if step_failed {
                status = TestStatus::Failed;
                failure = step_error;
                break;
            }
        }

        let duration_ms = step_once::elapsed_ms(start);
        info!(test_case = %test_case.id, %status, duration_ms, "test case finished");
        TestResult {
            test_case_id: test_case.id.clone(),
            status,
            steps,
            error: failure,
            duration_ms,
        }
    }
}
