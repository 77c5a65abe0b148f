//! Result sinks: a console summary and a JSON results file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use apirig_types::{AssertionResult, RunSummary, StepResult, TestResult, TestStatus};
use apirig_util::{stringify_value, truncate_for_summary};
use serde::Serialize;

const MAX_VALUE_WIDTH: usize = 120;

/// Somewhere a finished run is reported.
pub trait ReportSink {
    fn emit(&mut self, results: &[TestResult]) -> Result<()>;
}

/// Per-case and per-step status lines followed by the run summary.
pub struct ConsoleReport<W: Write> {
    out: W,
}

impl ConsoleReport<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_case(&mut self, result: &TestResult) -> io::Result<()> {
        if result.status == TestStatus::Skipped {
            return writeln!(self.out, "{} {}", tag(result.status), result.test_case_id);
        }
        writeln!(
            self.out,
            "{} {} ({} ms)",
            tag(result.status),
            result.test_case_id,
            result.duration_ms
        )?;
        if let Some(error) = &result.error {
            writeln!(self.out, "    error: {error}")?;
        }
        for step in &result.steps {
            self.write_step(step)?;
        }
        Ok(())
    }

    fn write_step(&mut self, step: &StepResult) -> io::Result<()> {
        let target = step
            .request
            .as_ref()
            .map(|request| format!(" {} {}", request.method, request.url))
            .unwrap_or_default();
        writeln!(
            self.out,
            "    {} {}{} ({} ms)",
            tag(step.status),
            step.step_id,
            target,
            step.duration_ms
        )?;
        if let Some(error) = &step.error {
            writeln!(self.out, "        error: {error}")?;
        }
        for assertion in step.assertions.iter().filter(|assertion| !assertion.is_passed()) {
            self.write_failed_assertion(assertion)?;
        }
        Ok(())
    }

    fn write_failed_assertion(&mut self, assertion: &AssertionResult) -> io::Result<()> {
        writeln!(
            self.out,
            "        assertion {}: expected {}, actual {}",
            assertion.assertion_id,
            truncate_for_summary(&stringify_value(&assertion.expected), MAX_VALUE_WIDTH),
            truncate_for_summary(&stringify_value(&assertion.actual), MAX_VALUE_WIDTH),
        )?;
        if let Some(error) = &assertion.error {
            writeln!(self.out, "            {error}")?;
        }
        Ok(())
    }
}

impl<W: Write> ReportSink for ConsoleReport<W> {
    fn emit(&mut self, results: &[TestResult]) -> Result<()> {
        for result in results {
            self.write_case(result)?;
        }
        writeln!(self.out, "{}", RunSummary::from_results(results))?;
        self.out.flush()?;
        Ok(())
    }
}

fn tag(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "[PASS]",
        TestStatus::Failed => "[FAIL]",
        TestStatus::Skipped => "[SKIP]",
    }
}

/// Writes the summary and full result list as pretty JSON.
pub struct JsonReport {
    path: PathBuf,
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    summary: RunSummary,
    results: &'a [TestResult],
}

impl JsonReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonReport {
    fn emit(&mut self, results: &[TestResult]) -> Result<()> {
        if let Some(parent_directory) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent_directory)
                .with_context(|| format!("create results directory {}", parent_directory.display()))?;
        }
        let file = File::create(&self.path).with_context(|| format!("create results file {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        let document = ResultsDocument {
            summary: RunSummary::from_results(results),
            results,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;
        tracing::info!(path = %self.path.display(), "results written");
        Ok(())
    }
}
