//! External systems an assertion can query.

use serde_json::Value;

use crate::errors::BackendError;

pub mod elasticsearch;
pub mod sqlite;

pub use elasticsearch::ElasticsearchBackend;
pub use sqlite::SqliteBackend;

/// Runs raw SQL and returns each row as a JSON object keyed by column name.
#[async_trait::async_trait]
pub trait DatabaseBackend: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Vec<Value>, BackendError>;
}

/// Runs a JSON search query and returns the matching hits.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &Value) -> Result<Vec<Value>, BackendError>;
}
