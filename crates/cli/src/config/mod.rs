//! Run configuration for the `apirig` binary.
//!
//! Values are layered: built-in defaults, then a JSON config file, then
//! `APIRIG_*` environment variables, then command-line flags.

mod interpolation;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use apirig_util::expand_home;
use dirs_next::config_dir;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use interpolation::interpolate_value;

pub const DEFAULT_DEFINITIONS: &str = "test_definitions.yaml";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEARCH_INDEX: &str = "_all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunConfig {
    pub definitions: PathBuf,
    #[serde(alias = "base_url")]
    pub base_url: String,
    pub database: Option<DatabaseConfig>,
    pub search: Option<SearchConfig>,
    #[serde(alias = "request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(alias = "default_headers")]
    pub default_headers: IndexMap<String, String>,
    #[serde(alias = "results_path")]
    pub results_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            definitions: PathBuf::from(DEFAULT_DEFINITIONS),
            base_url: DEFAULT_BASE_URL.to_string(),
            database: None,
            search: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_headers: IndexMap::new(),
            results_path: None,
        }
    }
}

/// SQLite database used by `database` assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Elasticsearch-compatible endpoint used by `search-index` assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    #[serde(default = "default_search_index")]
    pub index: String,
}

fn default_search_index() -> String {
    DEFAULT_SEARCH_INDEX.to_string()
}

/// Values given on the command line. `None` leaves the lower layers in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub definitions: Option<PathBuf>,
    pub base_url: Option<String>,
    pub results_path: Option<PathBuf>,
}

impl RunConfig {
    /// Build the effective configuration from every layer and validate it.
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let mut config = match config_file_path(overrides.config.as_deref())? {
            Some(path) => load_config_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Overlay the `APIRIG_*` environment variables. Blank values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(definitions) = env_value("APIRIG_DEFINITIONS") {
            self.definitions = expand_home(&definitions);
        }
        if let Some(base_url) = env_value("APIRIG_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(path) = env_value("APIRIG_DATABASE_PATH") {
            self.database = Some(DatabaseConfig { path: expand_home(&path) });
        }
        if let Some(url) = env_value("APIRIG_SEARCH_URL") {
            match &mut self.search {
                Some(search) => search.url = url,
                None => {
                    self.search = Some(SearchConfig {
                        url,
                        index: default_search_index(),
                    })
                }
            }
        }
        if let Some(index) = env_value("APIRIG_SEARCH_INDEX") {
            match &mut self.search {
                Some(search) => search.index = index,
                None => debug!("APIRIG_SEARCH_INDEX set without a search URL; ignoring"),
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(definitions) = &overrides.definitions {
            self.definitions = definitions.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(results_path) = &overrides.results_path {
            self.results_path = Some(results_path.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        apirig_api::validate_base_url(&self.base_url).context("invalid base URL")?;
        if self.request_timeout_secs == 0 {
            bail!("requestTimeoutSecs must be greater than zero");
        }
        if let Some(search) = &self.search {
            apirig_api::validate_base_url(&search.url).context("invalid search URL")?;
            if search.index.trim().is_empty() {
                bail!("search index must not be empty");
            }
        }
        Ok(())
    }
}

/// Returns the default path for the config file.
pub fn default_config_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("apirig")
        .join("config.json")
}

/// Pick the config file: an explicit path, then `APIRIG_CONFIG`, then the
/// default location when it exists. Explicit paths must exist.
fn config_file_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let chosen = explicit
        .map(Path::to_path_buf)
        .or_else(|| env_value("APIRIG_CONFIG").map(|path| expand_home(&path)));
    if let Some(path) = chosen {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Some(path));
    }

    let fallback = default_config_path();
    Ok(fallback.exists().then_some(fallback))
}

/// Loads and parses a JSON config file, interpolating `${env:NAME}` values.
pub fn load_config_from_path(path: &Path) -> Result<RunConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(RunConfig::default());
    }
    let mut raw_config: Value =
        serde_json::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
    interpolate_value(&mut raw_config)?;
    let mut config: RunConfig =
        serde_json::from_value(raw_config).with_context(|| format!("invalid config {}", path.display()))?;
    config.definitions = expand_home(&config.definitions.to_string_lossy());
    if let Some(database) = &mut config.database {
        database.path = expand_home(&database.path.to_string_lossy());
    }
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 6] = [
        "APIRIG_CONFIG",
        "APIRIG_DEFINITIONS",
        "APIRIG_BASE_URL",
        "APIRIG_DATABASE_PATH",
        "APIRIG_SEARCH_URL",
        "APIRIG_SEARCH_INDEX",
    ];

    /// Run with only the given `APIRIG_*` variables set.
    fn with_env<R>(vars: &[(&str, &str)], run: impl FnOnce() -> R) -> R {
        let pairs: Vec<(&str, Option<&str>)> = ENV_KEYS
            .iter()
            .map(|key| (*key, vars.iter().find(|(name, _)| name == key).map(|(_, value)| *value)))
            .collect();
        temp_env::with_vars(pairs, run)
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let mut config = RunConfig::default();
        with_env(&[], || config.apply_env());
        assert_eq!(config.definitions, PathBuf::from(DEFAULT_DEFINITIONS));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.database.is_none());
        assert!(config.search.is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn file_then_env_then_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            &dir,
            r#"{
                "definitions": "suites/file.yaml",
                "baseUrl": "http://file.example",
                "requestTimeoutSecs": 5,
                "search": {"url": "http://search.example:9200"},
                "defaultHeaders": {"X-Team": "qa"}
            }"#,
        );

        let overrides = CliOverrides {
            config: Some(path),
            base_url: Some("http://flag.example".into()),
            ..CliOverrides::default()
        };
        let config = with_env(
            &[
                ("APIRIG_DEFINITIONS", "suites/env.yaml"),
                ("APIRIG_BASE_URL", "http://env.example"),
                ("APIRIG_SEARCH_INDEX", "users"),
            ],
            || RunConfig::resolve(&overrides),
        )
        .expect("config");

        assert_eq!(config.definitions, PathBuf::from("suites/env.yaml"));
        assert_eq!(config.base_url, "http://flag.example");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        let search = config.search.expect("search");
        assert_eq!(search.url, "http://search.example:9200");
        assert_eq!(search.index, "users");
        assert_eq!(config.default_headers.get("X-Team").map(String::as_str), Some("qa"));
    }

    #[test]
    fn config_env_var_selects_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, r#"{"database": {"path": "/tmp/apirig.db"}}"#);
        let path_text = path.to_str().expect("utf-8 temp path");
        let config = with_env(&[("APIRIG_CONFIG", path_text)], || RunConfig::resolve(&CliOverrides::default()))
            .expect("config");
        assert_eq!(
            config.database,
            Some(DatabaseConfig {
                path: PathBuf::from("/tmp/apirig.db")
            })
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let overrides = CliOverrides {
            config: Some(dir.path().join("absent.json")),
            ..CliOverrides::default()
        };
        let error = with_env(&[], || RunConfig::resolve(&overrides)).expect_err("missing");
        assert!(error.to_string().contains("config file not found"));
    }

    #[test]
    fn file_values_are_interpolated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, r#"{"baseUrl": "http://${env:APIRIG_TEST_API_HOST}:8080"}"#);
        let config = temp_env::with_var("APIRIG_TEST_API_HOST", Some("staging"), || load_config_from_path(&path))
            .expect("config");
        assert_eq!(config.base_url, "http://staging:8080");
    }

    #[test]
    fn env_database_and_search_create_sections() {
        let mut config = RunConfig::default();
        with_env(
            &[
                ("APIRIG_DATABASE_PATH", "data/app.db"),
                ("APIRIG_SEARCH_URL", "http://localhost:9200"),
            ],
            || config.apply_env(),
        );
        assert_eq!(config.database.expect("database").path, PathBuf::from("data/app.db"));
        let search = config.search.expect("search");
        assert_eq!(search.index, DEFAULT_SEARCH_INDEX);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let config = RunConfig {
            base_url: "ftp://example.com".into(),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            request_timeout_secs: 0,
            ..RunConfig::default()
        };
        let error = config.validate().expect_err("zero timeout");
        assert!(error.to_string().contains("greater than zero"));

        let config = RunConfig {
            search: Some(SearchConfig {
                url: "not a url".into(),
                index: "users".into(),
            }),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
