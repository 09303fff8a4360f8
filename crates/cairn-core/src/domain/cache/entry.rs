//! Cache entries

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;

/// Longest TTL an entry can carry; longer requests are clamped
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A cached value with its expiry and access bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_access: Instant,
    /// Monotonic access sequence; orders entries for LRU eviction
    pub(crate) access_seq: u64,
    pub hits: u64,
    /// Serialized key plus value length
    pub size_bytes: usize,
}

impl CacheEntry {
    pub(crate) fn new(key: &str, value: Value, ttl: Duration, access_seq: u64) -> Self {
        let now = Instant::now();
        let size_bytes = key.len() + value.to_string().len();

        Self {
            value,
            created_at: now,
            expires_at: now + ttl.min(MAX_TTL),
            last_access: now,
            access_seq,
            hits: 0,
            size_bytes,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    pub(crate) fn touch(&mut self, access_seq: u64) {
        self.hits += 1;
        self.last_access = Instant::now();
        self.access_seq = access_seq;
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MAX_TTL)).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Wall-clock form of an entry, used by persistence backends
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedEntry {
    pub key: String,
    pub value: Value,
    pub size_bytes: usize,
    pub hits: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PersistedEntry {
    pub(crate) fn from_entry(key: &str, entry: &CacheEntry) -> Self {
        let now = Instant::now();
        let wall_now = Utc::now();
        let age = now.saturating_duration_since(entry.created_at);
        let remaining = entry.remaining_ttl(now);

        Self {
            key: key.to_string(),
            value: entry.value.clone(),
            size_bytes: entry.size_bytes,
            hits: entry.hits,
            created_at: wall_now - to_delta(age),
            expires_at: wall_now + to_delta(remaining),
        }
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let entry = CacheEntry::new("k", json!({"a": 1}), Duration::from_secs(10), 0);
        assert!(!entry.is_expired(Instant::now()));
        assert_eq!(entry.size_bytes, 1 + r#"{"a":1}"#.len());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(entry.is_expired(Instant::now()));
        assert_eq!(entry.remaining_ttl(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_remaining_ttl() {
        let entry = CacheEntry::new("k", json!(1), Duration::from_secs(60), 0);
        let persisted = PersistedEntry::from_entry("k", &entry);
        let remaining = persisted.remaining_ttl(Utc::now()).unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));

        assert!(persisted.remaining_ttl(persisted.expires_at).is_none());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped() {
        let entry = CacheEntry::new("k", json!(1), Duration::from_secs(u64::MAX), 0);
        let remaining = entry.remaining_ttl(Instant::now());
        assert!(remaining <= MAX_TTL);
        assert!(remaining > MAX_TTL - Duration::from_secs(60));

        let persisted = PersistedEntry::from_entry("k", &entry);
        assert!(persisted.remaining_ttl(Utc::now()).is_some());
    }
}
