//! SQLite-backed [`DatabaseBackend`].

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tracing::debug;

use super::DatabaseBackend;
use crate::errors::BackendError;

pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|error| BackendError::Connection {
            message: format!("{}: {error}", path.display()),
        })?;
        Ok(Self::from_connection(connection))
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        let connection = Connection::open_in_memory().map_err(|error| BackendError::Connection {
            message: error.to_string(),
        })?;
        Ok(Self::from_connection(connection))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }

    /// Run statements that return no rows, such as fixture setup.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        let connection = self.lock()?;
        connection.execute_batch(sql).map_err(query_error)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, BackendError> {
        self.connection.lock().map_err(|_| BackendError::Connection {
            message: "sqlite connection lock poisoned".to_string(),
        })
    }

    fn run_query(&self, sql: &str) -> Result<Vec<Value>, BackendError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(sql).map_err(query_error)?;
        let columns: Vec<String> = statement.column_names().into_iter().map(str::to_string).collect();

        let mut rows = statement.query([]).map_err(query_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut record = Map::new();
            for (index, column) in columns.iter().enumerate() {
                let cell = row.get_ref(index).map_err(query_error)?;
                record.insert(column.clone(), cell_to_json(cell));
            }
            records.push(Value::Object(record));
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn query(&self, sql: &str) -> Result<Vec<Value>, BackendError> {
        let records = self.run_query(sql)?;
        debug!(row_count = records.len(), "sqlite query completed");
        Ok(records)
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn query_error(error: rusqlite::Error) -> BackendError {
    BackendError::Query {
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().expect("sqlite");
        backend
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, score REAL, deleted_at TEXT);
                 INSERT INTO users (id, email, score, deleted_at) VALUES (1, 'jane@example.com', 4.5, NULL);
                 INSERT INTO users (id, email, score, deleted_at) VALUES (2, 'joe@example.com', 3.0, NULL);",
            )
            .expect("seed");
        backend
    }

    #[tokio::test]
    async fn rows_become_objects_keyed_by_column() {
        let backend = seeded();
        let rows = backend
            .query("SELECT id, email, score, deleted_at FROM users ORDER BY id")
            .await
            .expect("rows");
        assert_eq!(
            rows,
            vec![
                json!({"id": 1, "email": "jane@example.com", "score": 4.5, "deleted_at": null}),
                json!({"id": 2, "email": "joe@example.com", "score": 3.0, "deleted_at": null}),
            ]
        );
    }

    #[tokio::test]
    async fn sql_errors_are_query_errors() {
        let backend = seeded();
        let error = backend.query("SELECT * FROM nope").await.expect_err("missing table");
        assert!(matches!(error, BackendError::Query { .. }));
    }

    #[test]
    fn missing_directory_is_a_connection_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = SqliteBackend::open(dir.path().join("missing").join("db.sqlite"));
        assert!(matches!(result, Err(BackendError::Connection { .. })));
    }
}
