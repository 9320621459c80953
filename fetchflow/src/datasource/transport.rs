//! Transport seam performing one HTTP(S)-style request.
//!
//! Retry, backoff, and timeout discipline live in the invoker; a transport
//! performs exactly one request and reports what happened.

use super::HttpMethod;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a transport for a single request.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be built or sent.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("Response read failed: {0}")]
    Read(String),
}

/// One fully-materialized request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Method to issue.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Flattened request headers (profile defaults already merged).
    pub headers: HashMap<String, String>,
    /// Flattened query parameters.
    pub query: Vec<(String, String)>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Raw response produced by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, parsed as JSON when possible, else the raw text.
    pub data: Value,
    /// Response headers.
    pub headers: HashMap<String, String>,
}

/// Performs one HTTP(S)-style request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the request, returning the raw response or a transport error.
    async fn perform(&self, request: &TransportRequest)
        -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Creates a transport over a pre-configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(
        &self,
        request: &TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, request.url.as_str())
            .timeout(Duration::from_millis(request.timeout_ms));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|text| (name.to_string(), text.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|err| TransportError::Read(err.to_string()))?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(TransportResponse {
            status,
            data,
            headers,
        })
    }
}
