use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use apirig_api::ApiClient;
use apirig_engine::{AssertionEngine, ElasticsearchBackend, Executor, HttpRequestClient, SqliteBackend, load_validated_suite};
use apirig_types::{RunSummary, TestResult};
use clap::Parser;
use tracing::info;

mod config;
mod report;

use config::{CliOverrides, RunConfig};
use report::{ConsoleReport, JsonReport, ReportSink};

/// Run a data-driven API test suite.
#[derive(Debug, Parser)]
#[command(name = "apirig", version, about)]
struct Args {
    /// JSON config file (defaults to APIRIG_CONFIG, then the user config dir).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Suite document (YAML or JSON).
    #[arg(long, short = 'd')]
    definitions: Option<PathBuf>,

    /// Base URL that relative step endpoints are joined to.
    #[arg(long)]
    base_url: Option<String>,

    /// Run only this test case (and its prerequisite).
    #[arg(long = "case", value_name = "TEST_CASE_ID")]
    test_case: Option<String>,

    /// Also write results as JSON to this path.
    #[arg(long)]
    results: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let overrides = CliOverrides {
        config: args.config.clone(),
        definitions: args.definitions.clone(),
        base_url: args.base_url.clone(),
        results_path: args.results.clone(),
    };
    let config = RunConfig::resolve(&overrides)?;
    let results = run_suite(&config, args.test_case.as_deref()).await?;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleReport::stdout())];
    if let Some(path) = &config.results_path {
        sinks.push(Box::new(JsonReport::new(path)));
    }
    for sink in &mut sinks {
        sink.emit(&results)?;
    }

    let summary = RunSummary::from_results(&results);
    info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "run finished"
    );
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_suite(config: &RunConfig, test_case: Option<&str>) -> Result<Vec<TestResult>> {
    let suite = load_validated_suite(&config.definitions)?;
    info!(
        definitions = %config.definitions.display(),
        test_cases = suite.test_cases.len(),
        steps = suite.test_steps.len(),
        "suite loaded"
    );

    let assertions = build_assertion_engine(config)?;
    let api = ApiClient::new(&config.base_url, config.request_timeout(), &config.default_headers)?;
    let mut executor = Executor::new(suite, Arc::new(HttpRequestClient::new(api)), assertions);

    match test_case {
        Some(test_case_id) => match executor.execute_test_case(test_case_id).await {
            Some(results) => Ok(results),
            None => bail!("unknown test case: {test_case_id}"),
        },
        None => Ok(executor.execute_all().await),
    }
}

fn build_assertion_engine(config: &RunConfig) -> Result<AssertionEngine> {
    let mut engine = AssertionEngine::new();
    if let Some(database) = &config.database {
        let backend = SqliteBackend::open(&database.path)
            .with_context(|| format!("open database {}", database.path.display()))?;
        engine = engine.with_database(Arc::new(backend));
    }
    if let Some(search) = &config.search {
        let backend = ElasticsearchBackend::new(&search.url, search.index.clone(), config.request_timeout())
            .with_context(|| format!("connect search backend {}", search.url))?;
        engine = engine.with_search(Arc::new(backend));
    }
    Ok(engine)
}
