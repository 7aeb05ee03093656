//! Engine-facing cache layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use super::store::CacheStore;
use crate::errors::Result;

/// Namespaced read-through cache over a pluggable backend.
///
/// Backend failures never escape this layer: `get`/`exists` degrade
/// to a miss/`false` and `set`/`delete`/`clear` become logged no-ops.
/// Under a cache outage the engine recomputes on every read, which is
/// slower but still correct.
#[derive(Clone)]
pub struct AnalyticsCache {
    store: Arc<dyn CacheStore>,
}

impl AnalyticsCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!("Cache get failed for '{}', treating as miss: {}", key, err);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        if let Err(err) = self.store.set(key, value, ttl).await {
            warn!("Cache set failed for '{}', value not cached: {}", key, err);
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!("Cache delete failed for '{}': {}", key, err);
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.store.exists(key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    "Cache exists failed for '{}', treating as absent: {}",
                    key, err
                );
                false
            }
        }
    }

    /// Clears one namespace (`coordinator:`, `batch:`, `aggregation:`).
    pub async fn clear(&self, prefix: &str) {
        match self.store.clear_prefix(prefix).await {
            Ok(removed) => debug!("Cleared {} cache entries under '{}'", removed, prefix),
            Err(err) => warn!("Cache clear failed for prefix '{}': {}", prefix, err),
        }
    }

    /// Read-through primitive: returns the cached value, or calls
    /// `fetch` (at most once per miss), caches its result, and returns
    /// it. Fetch errors propagate; cache errors on either side do not.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::errors::CacheError;

    /// Backend that fails every operation, simulating an outage.
    struct UnavailableStore;

    #[async_trait]
    impl CacheStore for UnavailableStore {
        async fn get(&self, _key: &str) -> std::result::Result<Option<Value>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: Value,
            _ttl: Duration,
        ) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn exists(&self, _key: &str) -> std::result::Result<bool, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn clear_prefix(&self, _prefix: &str) -> std::result::Result<u64, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_set_fetches_once_per_miss() {
        let cache = AnalyticsCache::new(Arc::new(MemoryCacheStore::new()));
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        let first = cache
            .get_or_set("k1", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("computed"))
            })
            .await
            .unwrap();

        let second = cache
            .get_or_set("k1", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("recomputed"))
            })
            .await
            .unwrap();

        assert_eq!(first, json!("computed"));
        assert_eq!(second, json!("computed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_set_fetches_again_after_expiry() {
        let cache = AnalyticsCache::new(Arc::new(MemoryCacheStore::new()));
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(1);

        for _ in 0..2 {
            cache
                .get_or_set("k1", ttl, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                })
                .await
                .unwrap();
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_outage_degrades_to_miss_without_error() {
        let cache = AnalyticsCache::new(Arc::new(UnavailableStore));

        assert!(cache.get("k1").await.is_none());
        assert!(!cache.exists("k1").await);
        // Writes are swallowed.
        cache.set("k1", json!(1), Duration::from_secs(10)).await;
        cache.delete("k1").await;
        cache.clear("batch:").await;

        // get_or_set still produces a value by recomputing.
        let value = cache
            .get_or_set("k1", Duration::from_secs(10), || async { Ok(json!(7)) })
            .await
            .unwrap();
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn test_get_or_set_propagates_fetch_error() {
        let cache = AnalyticsCache::new(Arc::new(MemoryCacheStore::new()));

        let result = cache
            .get_or_set("k1", Duration::from_secs(10), || async {
                Err(crate::errors::Error::compute("thread", "t1", "boom"))
            })
            .await;

        assert!(result.is_err());
        assert!(cache.get("k1").await.is_none());
    }
}
