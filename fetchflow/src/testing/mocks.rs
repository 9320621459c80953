//! Mock collaborators for engine tests.

use crate::cache::{CacheStore, InMemoryCache};
use crate::datasource::{Transport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Transport replaying a scripted list of responses.
///
/// Responses cycle when the script is shorter than the number of calls, so a
/// single failure entry models a permanently failing datasource. Every
/// performed request is recorded for assertions.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedTransport {
    /// Creates a transport with no scripted responses; every call fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Transport answering every call with `200` and the given body.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        let transport = Self::new();
        transport.push_ok(200, data);
        transport
    }

    /// Transport failing every call with the given message.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.push_error(message);
        transport
    }

    /// Queues a response with the given status and body.
    pub fn push_ok(&self, status: u16, data: Value) {
        self.responses.lock().push(Ok(TransportResponse {
            status,
            data,
            headers: HashMap::new(),
        }));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .push(Err(TransportError::Request(message.into())));
    }

    /// Returns how many calls were performed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the requests performed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &self,
        request: &TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock();
        if responses.is_empty() {
            return Err(TransportError::Request("no scripted response".to_string()));
        }
        responses[index % responses.len()].clone()
    }
}

/// Cache wrapper counting reads and writes, optionally refusing writes.
pub struct RecordingCache {
    inner: InMemoryCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
    reject_writes: bool,
}

impl RecordingCache {
    /// Creates an empty recording cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: InMemoryCache::new(),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            reject_writes: false,
        }
    }

    /// Cache that refuses every write, for best-effort assertions.
    #[must_use]
    pub fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::new()
        }
    }

    /// Returns how many reads were attempted.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Returns how many writes were attempted.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Seeds an entry directly, bypassing the counters.
    pub async fn seed(&self, key: &str, value: Value) {
        self.inner.set(key, value, Duration::from_secs(60)).await;
    }
}

impl Default for RecordingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes {
            return false;
        }
        self.inner.set(key, value, ttl).await
    }
}
