//! Elasticsearch-compatible [`SearchBackend`] over HTTP.

use std::time::{Duration, Instant};

use apirig_api::ApiClient;
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::SearchBackend;
use crate::errors::BackendError;

/// Posts queries to `{base_url}/{index}/_search` and returns `hits.hits`.
///
/// A query object carrying `index` or `body` keys selects the index and the
/// request body explicitly; any other value is sent as the body against the
/// default index.
pub struct ElasticsearchBackend {
    client: ApiClient,
    default_index: String,
}

impl ElasticsearchBackend {
    pub fn new(base_url: &str, default_index: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let mut headers = IndexMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let client = ApiClient::new(base_url, timeout, &headers).map_err(|error| BackendError::Connection {
            message: error.to_string(),
        })?;
        Ok(Self {
            client,
            default_index: default_index.into(),
        })
    }

    fn split_query(&self, query: &Value) -> (String, Value) {
        if let Value::Object(map) = query
            && (map.contains_key("index") || map.contains_key("body"))
        {
            let index = map
                .get("index")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.default_index.clone());
            let body = map
                .get("body")
                .cloned()
                .unwrap_or_else(|| json!({"query": {"match_all": {}}}));
            return (index, body);
        }
        (self.default_index.clone(), query.clone())
    }
}

#[async_trait::async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn search(&self, query: &Value) -> Result<Vec<Value>, BackendError> {
        let start = Instant::now();
        let (index, body) = self.split_query(query);
        let path = format!("{}/_search", index.trim_matches('/'));

        let request = self
            .client
            .request(Method::POST, &path)
            .map_err(|error| BackendError::Search {
                message: error.to_string(),
            })?;
        let response = request.json(&body).send().await.map_err(|error| BackendError::Search {
            message: error.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| BackendError::Search {
            message: error.to_string(),
        })?;
        if !status.is_success() {
            warn!(
                index = %index,
                status = %status,
                duration_ms = start.elapsed().as_millis(),
                "search request failed"
            );
            return Err(BackendError::Search {
                message: format!("status {}: {}", status.as_u16(), apirig_util::truncate_for_summary(&text, 200)),
            });
        }

        let payload: Value = serde_json::from_str(&text).map_err(|error| BackendError::Search {
            message: format!("response is not JSON: {error}"),
        })?;
        let hits = extract_hits(&payload)?;
        debug!(
            index = %index,
            hit_count = hits.len(),
            duration_ms = start.elapsed().as_millis(),
            "search request completed"
        );
        Ok(hits)
    }
}

fn extract_hits(payload: &Value) -> Result<Vec<Value>, BackendError> {
    payload
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| BackendError::Search {
            message: "response has no hits.hits array".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> ElasticsearchBackend {
        ElasticsearchBackend::new("http://localhost:9200", "users", Duration::from_secs(1)).expect("backend")
    }

    #[test]
    fn bare_query_targets_default_index() {
        let query = json!({"query": {"term": {"email": "jane@example.com"}}});
        let (index, body) = backend().split_query(&query);
        assert_eq!(index, "users");
        assert_eq!(body, query);
    }

    #[test]
    fn envelope_selects_index_and_body() {
        let (index, body) = backend().split_query(&json!({"index": "audit", "body": {"size": 1}}));
        assert_eq!(index, "audit");
        assert_eq!(body, json!({"size": 1}));

        let (index, body) = backend().split_query(&json!({"index": "audit"}));
        assert_eq!(index, "audit");
        assert_eq!(body, json!({"query": {"match_all": {}}}));
    }

    #[test]
    fn hits_are_read_from_the_nested_array() {
        let payload = json!({"hits": {"total": {"value": 1}, "hits": [{"_id": "1", "_source": {"id": 1}}]}});
        assert_eq!(extract_hits(&payload).expect("hits"), vec![json!({"_id": "1", "_source": {"id": 1}})]);
        assert!(extract_hits(&json!({"error": "boom"})).is_err());
    }
}
