use std::time::Instant;

use apirig_api::ApiClient;
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::assertions::ResponseSnapshot;
use crate::errors::ClientError;

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Endpoint relative to the client's base URL, or an absolute URL.
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

/// The response as seen by the executor.
///
/// `body` is parsed JSON; an empty body is `null` and non-JSON text is kept as
/// a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// The URL the request was sent to, after base URL resolution.
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

impl HttpResponse {
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Sends requests on behalf of the executor.
///
/// Implementations return `Ok` for every HTTP response, whatever its status;
/// only transport failures are errors.
#[async_trait::async_trait]
pub trait RequestClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// [`RequestClient`] backed by [`ApiClient`].
pub struct HttpRequestClient {
    client: ApiClient,
}

impl HttpRequestClient {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RequestClient for HttpRequestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let start = Instant::now();
        debug!(
            method = %request.method,
            path = %request.url,
            header_count = request.headers.len(),
            has_body = request.body.is_some(),
            "http request started"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .map_err(|error| ClientError::InvalidRequest {
                message: error.to_string(),
            })?;
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| {
            warn!(
                method = %request.method,
                path = %request.url,
                error = %error,
                duration_ms = start.elapsed().as_millis(),
                "http request failed"
            );
            transport_error(&request.url, error)
        })?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let text = response.text().await.map_err(|error| transport_error(&url, error))?;
        let body = parse_body(&text);

        debug!(
            method = %request.method,
            url = %url,
            status,
            body_len = text.len(),
            duration_ms = start.elapsed().as_millis(),
            "http request completed"
        );
        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> ClientError {
    ClientError::Transport {
        url: url.to_string(),
        message: error.to_string(),
    }
}

/// Repeated headers are joined with `, `.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> IndexMap<String, String> {
    let mut collected: IndexMap<String, String> = IndexMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
