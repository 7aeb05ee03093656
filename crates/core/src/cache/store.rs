//! Cache backend trait and the default in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::errors::CacheError;

/// Storage backend for the analytics cache.
///
/// Implementations must be safe to call concurrently from timer tasks
/// and connection handlers. Expiry is the backend's responsibility: a
/// `get` after the entry's TTL has elapsed is a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Unconditionally overwrites any existing entry (last-writer-wins).
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry whose key starts with `prefix`, returning
    /// the number of entries removed.
    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

struct StoredEntry {
    value: Value,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Default in-memory backend.
///
/// Expired entries are removed lazily on access; `clear_prefix` also
/// drops them. Uses `tokio::time::Instant` so tests can pause and
/// advance the clock.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for diagnostics.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are evicted here rather than by a background
        // reaper; remove_if re-checks under the shard lock.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut removed = 0u64;
        // Expired entries outside the prefix are evicted opportunistically
        // but not counted; the count reports prefix matches only.
        self.entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                removed += 1;
                return false;
            }
            !entry.is_expired(now)
        });
        Ok(removed)
    }
}
