//! Datasource call execution with retry, backoff, and timeout discipline.

use super::{CallRequest, CallResult, DatasourceProfile, Transport, TransportRequest};
use crate::errors::DatasourceUnavailableError;
use crate::substitution::value_to_raw_string;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Base delay of the exponential backoff schedule.
const BACKOFF_BASE_MS: u64 = 100;

/// Issues calls against resolved profiles, wrapping the transport with the
/// per-profile retry budget, backoff schedule, and per-attempt timeout.
///
/// Backoff between attempt `k` and `k + 1` is `100ms * 2^(k-1)`: pure
/// exponential, no jitter, no cap, and no sleep after the final attempt.
pub struct DatasourceInvoker {
    transport: Arc<dyn Transport>,
}

impl DatasourceInvoker {
    /// Creates an invoker over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invokes one call, retrying up to `profile.retry_budget` times.
    ///
    /// Any transport error, timeout, or non-2xx status counts as a failed
    /// attempt. The first success returns immediately; exhaustion reports
    /// the attempt count and the last underlying error.
    pub async fn invoke(
        &self,
        profile: &DatasourceProfile,
        request: &CallRequest,
    ) -> Result<CallResult, DatasourceUnavailableError> {
        let mut last_error = String::new();

        for attempt in 1..=profile.retry_budget {
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1);
                tracing::debug!(
                    datasource = %profile.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(profile, request).await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::debug!(
                            datasource = %profile.name,
                            attempt,
                            "Datasource call succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(message) => {
                    tracing::warn!(
                        datasource = %profile.name,
                        attempt,
                        error = %message,
                        "Datasource call attempt failed"
                    );
                    last_error = message;
                }
            }
        }

        Err(DatasourceUnavailableError::new(
            &profile.name,
            profile.retry_budget,
            last_error,
        ))
    }

    /// Performs one attempt as a single unit: it either completes or times
    /// out against the profile timeout.
    async fn attempt(
        &self,
        profile: &DatasourceProfile,
        request: &CallRequest,
    ) -> Result<CallResult, String> {
        let transport_request = build_transport_request(profile, request);
        let timeout = Duration::from_millis(profile.timeout_ms);

        match tokio::time::timeout(timeout, self.transport.perform(&transport_request)).await {
            Err(_) => Err(format!("Attempt timed out after {}ms", profile.timeout_ms)),
            Ok(Err(err)) => Err(err.to_string()),
            Ok(Ok(response)) => {
                if (200..300).contains(&response.status) {
                    Ok(CallResult {
                        ok: true,
                        status: response.status,
                        data: response.data,
                        headers: response.headers,
                    })
                } else {
                    Err(format!("Request failed with status {}", response.status))
                }
            }
        }
    }
}

/// Delay before attempt `k + 1` for `k >= 1`.
fn backoff_delay(k: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(k - 1)))
}

/// Joins the profile base address and a call path.
fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Flattens a call into a transport request, merging profile default headers
/// under the per-request ones.
fn build_transport_request(
    profile: &DatasourceProfile,
    request: &CallRequest,
) -> TransportRequest {
    let mut headers: HashMap<String, String> = profile.default_headers.clone();
    if let Some(overrides) = &request.headers {
        for (name, value) in overrides {
            headers.insert(name.clone(), value_to_raw_string(value));
        }
    }

    let query = request
        .query
        .as_ref()
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.clone(), value_to_raw_string(value)))
                .collect()
        })
        .unwrap_or_default();

    TransportRequest {
        method: request.method,
        url: join_url(&profile.base_address, &request.path),
        body: request.body.clone(),
        headers,
        query,
        timeout_ms: profile.timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::super::transport::{
        MockTransport, TransportError, TransportRequest, TransportResponse,
    };
    use super::*;
    use crate::datasource::HttpMethod;
    use crate::testing::ScriptedTransport;
    use async_trait::async_trait;
    use serde_json::json;

    fn profile(retry_budget: u32) -> DatasourceProfile {
        DatasourceProfile::new("backend", "rest", "http://localhost:9999")
            .with_retry_budget(retry_budget)
            .with_timeout_ms(1_000)
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_attempts_exactly_budget_times() {
        let transport = Arc::new(ScriptedTransport::failing("connection refused"));
        let invoker = DatasourceInvoker::new(transport.clone());

        let started = tokio::time::Instant::now();
        let err = invoker
            .invoke(&profile(3), &CallRequest::new(HttpMethod::Get, "/ping"))
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 3);
        assert_eq!(err.attempts, 3);
        assert!(err.last_error.contains("connection refused"));
        // 100ms + 200ms between attempts, no sleep after the final one.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_sleeps_never() {
        let transport = Arc::new(ScriptedTransport::ok(json!({"id": 1})));
        let invoker = DatasourceInvoker::new(transport.clone());

        let started = tokio::time::Instant::now();
        let result = invoker
            .invoke(&profile(5), &CallRequest::new(HttpMethod::Get, "/users/1"))
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(result.status, 200);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_returns_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_error("connection reset");
        transport.push_ok(200, json!({"id": 1}));
        let invoker = DatasourceInvoker::new(transport.clone());

        let started = tokio::time::Instant::now();
        let result = invoker
            .invoke(&profile(3), &CallRequest::new(HttpMethod::Get, "/users/1"))
            .await
            .unwrap();

        assert_eq!(result.data, json!({"id": 1}));
        assert_eq!(transport.call_count(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_2xx_status_counts_as_attempt_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(503, json!({"error": "overloaded"}));
        let invoker = DatasourceInvoker::new(transport.clone());

        let err = invoker
            .invoke(&profile(2), &CallRequest::new(HttpMethod::Get, "/ping"))
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 2);
        assert!(err.last_error.contains("status 503"));
    }

    struct PendingTransport;

    #[async_trait]
    impl Transport for PendingTransport {
        async fn perform(
            &self,
            _request: &TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_times_out_as_one_unit() {
        let invoker = DatasourceInvoker::new(Arc::new(PendingTransport));
        let profile = profile(1).with_timeout_ms(50);

        let err = invoker
            .invoke(&profile, &CallRequest::new(HttpMethod::Get, "/slow"))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert!(err.last_error.contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_invoke_over_mock_transport() {
        let mut transport = MockTransport::new();
        transport.expect_perform().times(1).returning(|_| {
            Ok(TransportResponse {
                status: 201,
                data: json!({"created": true}),
                headers: HashMap::new(),
            })
        });
        let invoker = DatasourceInvoker::new(Arc::new(transport));

        let result = invoker
            .invoke(
                &profile(1),
                &CallRequest::new(HttpMethod::Post, "/orders").with_body(json!({"sku": "A-1"})),
            )
            .await
            .unwrap();

        assert_eq!(result.status, 201);
    }

    #[test]
    fn test_backoff_delay_schedule() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(400));
        assert_eq!(backoff_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_join_url_normalizes_slashes() {
        assert_eq!(
            join_url("http://api.local/", "/users"),
            "http://api.local/users"
        );
        assert_eq!(
            join_url("http://api.local", "users"),
            "http://api.local/users"
        );
        assert_eq!(join_url("http://api.local/", ""), "http://api.local/");
    }

    #[test]
    fn test_request_headers_override_profile_defaults() {
        let profile = profile(1)
            .with_default_header("accept", "application/json")
            .with_default_header("x-tenant", "acme");
        let mut headers = serde_json::Map::new();
        headers.insert("x-tenant".to_string(), json!("globex"));
        let request = CallRequest::new(HttpMethod::Get, "/users").with_headers(headers);

        let transport_request = build_transport_request(&profile, &request);

        assert_eq!(
            transport_request.headers.get("accept"),
            Some(&"application/json".to_string())
        );
        assert_eq!(
            transport_request.headers.get("x-tenant"),
            Some(&"globex".to_string())
        );
    }

    #[test]
    fn test_query_values_flatten_to_raw_text() {
        let mut query = serde_json::Map::new();
        query.insert("name".to_string(), json!("ada"));
        query.insert("limit".to_string(), json!(25));
        let request = CallRequest::new(HttpMethod::Get, "/users").with_query(query);

        let transport_request = build_transport_request(&profile(1), &request);

        assert!(transport_request
            .query
            .contains(&("name".to_string(), "ada".to_string())));
        assert!(transport_request
            .query
            .contains(&("limit".to_string(), "25".to_string())));
    }
}
