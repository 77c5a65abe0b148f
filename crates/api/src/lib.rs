//! HTTP client utilities for the system under test.
//!
//! This module provides a lightweight client wrapping `reqwest`. It focuses on:
//!
//! - Constructing an HTTP client with a timeout and default headers
//! - Validating the configured base URL
//! - Resolving step endpoints against that base URL
//!
//! The primary entry point is [`ApiClient`]. Create an instance via
//! [`ApiClient::new`], and then build requests with [`ApiClient::request`].
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use apirig_api::ApiClient;
//!
//! let client = ApiClient::new("http://localhost:3000", Duration::from_secs(30), &Default::default())?;
//! let response = client.request(reqwest::Method::GET, "/api/users/1")?.send().await?;
//! println!("status: {}", response.status());
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use reqwest::{Client, RequestBuilder, header};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client`.
///
/// Relative endpoints are appended to `base_url`; absolute endpoints are used
/// as given so a step can target a second service.
pub struct ApiClient {
    pub base_url: Url,
    pub http: Client,
    pub user_agent: String,
}

impl ApiClient {
    /// Construct an [`ApiClient`] for `base_url`.
    ///
    /// `default_headers` are sent with every request; per-request headers with
    /// the same name override them.
    pub fn new(base_url: &str, timeout: Duration, default_headers: &IndexMap<String, String>) -> Result<Self> {
        let base_url = validate_base_url(base_url)?;

        let mut headers = header::HeaderMap::new();
        for (name, value) in default_headers {
            let header_name = header::HeaderName::from_bytes(name.trim().as_bytes())
                .with_context(|| format!("invalid default header name '{name}'"))?;
            let header_value = header::HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for default header '{name}'"))?;
            headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("apirig/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Resolve a step endpoint into a full URL.
    pub fn resolve_url(&self, endpoint: &str) -> Result<Url> {
        let endpoint = endpoint.trim();
        if let Ok(absolute) = Url::parse(endpoint)
            && matches!(absolute.scheme(), "http" | "https")
        {
            return Ok(absolute);
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined).map_err(|error| anyhow!("invalid endpoint '{}': {}", endpoint, error))
    }

    /// Build a `reqwest::RequestBuilder` for a method and endpoint.
    ///
    /// The resulting request includes the configured User-Agent and default
    /// headers.
    pub fn request(&self, method: reqwest::Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.resolve_url(endpoint)?;
        debug!(%url, %method, "building request");

        Ok(self
            .http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent))
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - the URL must parse
/// - the scheme must be `http` or `https`
/// - a host must be present
pub fn validate_base_url(base: &str) -> Result<Url> {
    let parsed_base_url = Url::parse(base.trim()).map_err(|e| anyhow!("Invalid base URL '{}': {}", base, e))?;

    if !matches!(parsed_base_url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "base URL must use http or https; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    if parsed_base_url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("base URL must include a host"));
    }

    Ok(parsed_base_url)
}
