//! TTL + LRU query cache
//!
//! An explicitly constructed, cloneable handle over shared state. Entries
//! expire after their TTL; when a new key arrives at capacity, exactly one
//! entry (the least recently accessed) is evicted first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::backend::CacheBackend;
use super::entry::{CacheEntry, MAX_TTL, PersistedEntry};
use super::stats::{CacheStats, Counters};
use super::task::SweeperHandle;

/// Cache sizing and timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry count at which inserting a new key evicts one entry
    pub max_entries: usize,
    /// TTL used when a write does not specify one
    pub default_ttl: Duration,
    /// Period of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    counters: Counters,
    access_seq: u64,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.access_seq += 1;
        self.access_seq
    }

    fn evict_lru(&mut self) -> Option<String> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_seq)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&victim);
        self.counters.evictions += 1;
        Some(victim)
    }

    fn insert(&mut self, key: &str, value: Value, ttl: Duration, max_entries: usize) -> Option<String> {
        let evicted = if !self.entries.contains_key(key) && self.entries.len() >= max_entries.max(1) {
            self.evict_lru()
        } else {
            None
        };
        let seq = self.next_seq();
        self.entries
            .insert(key.to_string(), CacheEntry::new(key, value, ttl, seq));
        evicted
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        self.counters.expirations += purged as u64;
        purged
    }
}

/// Shared query cache handle
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    config: CacheConfig,
    backend: Option<Arc<dyn CacheBackend>>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("persistent", &self.backend.is_some())
            .finish()
    }
}

impl QueryCache {
    /// Create an in-memory cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            config,
            backend: None,
        }
    }

    /// Mirror writes to a persistence backend
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    // ========== Reads ==========

    /// Look up a live entry; expired entries read as misses and are removed
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let expired = match state.entries.get(key) {
            None => {
                state.counters.record_miss(key);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            state.entries.remove(key);
            state.counters.expirations += 1;
            state.counters.record_miss(key);
            debug!(key = %key, "Cache entry expired");
            return None;
        }

        let seq = state.next_seq();
        state.counters.record_hit(key);
        let entry = state.entries.get_mut(key)?;
        entry.touch(seq);
        Some(entry.value.clone())
    }

    /// Typed lookup; a value that no longer deserializes reads as a miss
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key = %key, error = %e, "Cached value has an unexpected shape");
                None
            }
        }
    }

    // ========== Writes ==========

    /// Store a value, resetting its expiry
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let (evicted, persisted) = {
            let mut state = self.state.lock().await;
            let evicted = state.insert(key, value, ttl, self.config.max_entries);
            let persisted = state
                .entries
                .get(key)
                .map(|entry| PersistedEntry::from_entry(key, entry));
            (evicted, persisted)
        };

        if let Some(evicted) = evicted {
            debug!(evicted = %evicted, key = %key, "Evicted least recently used entry");
            self.mirror_delete(&evicted).await;
        }
        if let (Some(backend), Some(entry)) = (&self.backend, persisted) {
            if let Err(e) = backend.save(&entry).await {
                warn!(key = %key, error = %e, "Failed to persist cache entry");
            }
        }
    }

    /// Serialize and store a value
    pub async fn set_serialized<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await;
        Ok(())
    }

    /// Return the cached value, or compute, store and return it
    ///
    /// A failing factory leaves the key absent. Concurrent cold calls may
    /// each run the factory.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get_as::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await?;
        self.set_serialized(key, &value, ttl).await?;
        Ok(value)
    }

    /// Remove one entry; returns whether it was present
    pub async fn delete(&self, key: &str) -> bool {
        let removed = self.state.lock().await.entries.remove(key).is_some();
        self.mirror_delete(key).await;
        removed
    }

    /// Remove every entry whose key starts with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> usize {
        let removed = {
            let mut state = self.state.lock().await;
            let before = state.entries.len();
            state.entries.retain(|key, _| !key.starts_with(prefix));
            before - state.entries.len()
        };

        if let Some(backend) = &self.backend {
            if let Err(e) = backend.delete_prefix(prefix).await {
                warn!(prefix = %prefix, error = %e, "Failed to delete persisted cache entries");
            }
        }
        removed
    }

    /// Remove every entry; statistics are kept
    pub async fn clear(&self) {
        self.state.lock().await.entries.clear();
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.clear().await {
                warn!(error = %e, "Failed to clear persisted cache");
            }
        }
    }

    /// Remove expired entries; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let purged = self.state.lock().await.purge_expired(Instant::now());
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.purge_expired(Utc::now()).await {
                warn!(error = %e, "Failed to purge persisted cache entries");
            }
        }
        if purged > 0 {
            debug!(purged = purged, "Purged expired cache entries");
        }
        purged
    }

    // ========== Introspection ==========

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let memory_bytes = state.entries.values().map(|e| e.size_bytes).sum();
        state.counters.snapshot(state.entries.len(), memory_bytes)
    }

    /// Entry count, including entries that expired but were not yet purged
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &str) -> bool {
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    // ========== Lifecycle ==========

    /// Write every live entry to the backend; returns how many were written
    pub async fn flush(&self) -> Result<usize> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };

        let entries: Vec<PersistedEntry> = {
            let state = self.state.lock().await;
            let now = Instant::now();
            state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .map(|(key, entry)| PersistedEntry::from_entry(key, entry))
                .collect()
        };

        for entry in &entries {
            backend.save(entry).await?;
        }
        info!(entries = entries.len(), "Cache flushed");
        Ok(entries.len())
    }

    /// Reload unexpired entries from the backend; returns how many were loaded
    pub async fn restore(&self) -> Result<usize> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };

        let now = Utc::now();
        let persisted = backend.load_live(now).await?;
        let mut state = self.state.lock().await;
        let mut restored = 0;

        for entry in persisted {
            let Some(ttl) = entry.remaining_ttl(now) else {
                continue;
            };
            state.insert(&entry.key, entry.value, ttl, self.config.max_entries);
            restored += 1;
        }

        info!(entries = restored, "Cache restored");
        Ok(restored)
    }

    /// Spawn the periodic expiry sweep
    pub fn start_sweeper(&self) -> SweeperHandle {
        let cache = self.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let period = self.config.sweep_interval.clamp(Duration::from_millis(1), MAX_TTL);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_clone.cancelled() => {
                        debug!("Cache sweeper received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.purge_expired().await;
                    }
                }
            }
        });

        SweeperHandle::new(cancel, join)
    }

    async fn mirror_delete(&self, key: &str) {
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.delete(key).await {
                warn!(key = %key, error = %e, "Failed to delete persisted cache entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::json;

    fn cache(max_entries: usize) -> QueryCache {
        QueryCache::new(CacheConfig {
            max_entries,
            default_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_and_expiry() {
        let cache = cache(10);
        cache.set("metrics:network", json!({"density": 0.5}), Some(Duration::from_secs(30))).await;
        assert_eq!(cache.get("metrics:network").await, Some(json!({"density": 0.5})));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("metrics:network").await, None);
        assert_eq!(cache.len().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_resets_expiry() {
        let cache = cache(10);
        cache.set("k", json!(1), Some(Duration::from_secs(10))).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", json!(2), Some(Duration::from_secs(10))).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.purge_expired().await, 0);
        assert_eq!(cache.get("k").await, Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_evicts_exactly_one() {
        let cache = cache(3);
        cache.set("a", json!("a"), None).await;
        cache.set("b", json!("b"), None).await;
        cache.set("c", json!("c"), None).await;

        // Touch a so b becomes the least recently accessed
        assert!(cache.get("a").await.is_some());
        cache.set("d", json!("d"), None).await;

        assert_eq!(cache.len().await, 3);
        assert!(!cache.contains("b").await);
        assert!(cache.contains("a").await);
        assert!(cache.contains("c").await);
        assert!(cache.contains("d").await);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let cache = cache(2);
        cache.set("a", json!(1), None).await;
        cache.set("b", json!(2), None).await;
        cache.set("a", json!(3), None).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stats().await.evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_set() {
        let cache = cache(10);
        let mut calls = 0;

        let first: u32 = cache
            .get_or_set("popular:5", None, || {
                calls += 1;
                async { Ok(42) }
            })
            .await
            .unwrap();
        assert_eq!(first, 42);

        let second: u32 = cache
            .get_or_set("popular:5", None, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(second, 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_set_failure_leaves_key_absent() {
        let cache = cache(10);
        let result: Result<u32> = cache
            .get_or_set("metrics:network", None, || async {
                Err(Error::Other("factory failed".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains("metrics:network").await);

        let retried: u32 = cache
            .get_or_set("metrics:network", None, || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(retried, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_prefix_and_clear() {
        let cache = cache(10);
        cache.set("subgraph:a:d1", json!(1), None).await;
        cache.set("subgraph:a:d2", json!(2), None).await;
        cache.set("subgraph:b:d1", json!(3), None).await;
        cache.set("metrics:network", json!(4), None).await;

        assert_eq!(cache.delete_prefix("subgraph:a:").await, 2);
        assert!(cache.delete("metrics:network").await);
        assert!(!cache.delete("metrics:network").await);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_memory_and_operations() {
        let cache = cache(10);
        cache.set("subgraph:a:x", json!("abc"), None).await;
        cache.get("subgraph:a:x").await;
        cache.get("recent:10").await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.memory_bytes, "subgraph:a:x".len() + "\"abc\"".len());
        assert_eq!(stats.operations["subgraph"].hits, 1);
        assert_eq!(stats.operations["recent"].misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_and_shuts_down() {
        let cache = cache(10);
        cache.set("k", json!(1), Some(Duration::from_secs(3))).await;
        let sweeper = cache.start_sweeper();

        tokio::time::advance(Duration::from_secs(6)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.expirations, 1);

        sweeper.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_durations_do_not_panic() {
        let cache = QueryCache::new(CacheConfig {
            max_entries: 10,
            default_ttl: Duration::from_secs(u64::MAX),
            sweep_interval: Duration::from_secs(u64::MAX),
        });

        cache.set("k", json!(1), None).await;
        let value: u32 = cache.get_or_set("n", None, || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.get("k").await, Some(json!(1)));

        let sweeper = cache.start_sweeper();
        tokio::time::advance(Duration::from_secs(3600)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.len().await, 2);
        sweeper.shutdown().await.unwrap();
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn save(&self, _entry: &PersistedEntry) -> Result<()> {
            Err(Error::Other("disk full".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(Error::Other("disk full".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64> {
            Err(Error::Other("disk full".into()))
        }
        async fn clear(&self) -> Result<()> {
            Err(Error::Other("disk full".into()))
        }
        async fn load_live(&self, _now: DateTime<Utc>) -> Result<Vec<PersistedEntry>> {
            Err(Error::Other("disk full".into()))
        }
        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64> {
            Err(Error::Other("disk full".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failures_do_not_fail_cache_calls() {
        let cache = cache(10).with_backend(Arc::new(FailingBackend));
        cache.set("k", json!(1), None).await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert!(cache.delete("k").await);
        cache.clear().await;
        assert_eq!(cache.purge_expired().await, 0);

        assert!(cache.flush().await.is_ok());
        assert!(cache.restore().await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_flush_and_restore_are_noops() {
        let cache = cache(10);
        cache.set("k", json!(1), None).await;
        assert_eq!(cache.flush().await.unwrap(), 0);
        assert_eq!(cache.restore().await.unwrap(), 0);
        assert!(!cache.is_persistent());
    }
}
