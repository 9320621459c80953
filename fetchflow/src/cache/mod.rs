//! Best-effort look-aside cache collaborators.
//!
//! The engine only ever calls [`CacheStore::get`] and [`CacheStore::set`];
//! absence or failure of the cache must never abort an execution, so the
//! contract is infallible at the interface: a failed read is a miss and a
//! failed write returns `false`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Look-aside cache contract consumed by the resolver executor.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` when absent or
    /// expired.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key` for `ttl`, returning whether the write
    /// stuck.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> bool;
}

/// Cache that never stores anything. The default collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-memory TTL cache backed by a concurrent map.
///
/// Expired entries are evicted lazily on read or via [`purge_expired`].
///
/// [`purge_expired`]: InMemoryCache::purge_expired
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries, including expired ones not yet
    /// evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        match Instant::now().checked_add(ttl) {
            Some(expires_at) => {
                self.entries
                    .insert(key.to_string(), CacheEntry { value, expires_at });
                true
            }
            None => false,
        }
    }
}
