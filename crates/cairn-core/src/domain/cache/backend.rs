//! Cache persistence abstraction
//!
//! A backend mirrors cache writes so entries survive restarts. The cache
//! never depends on it for correctness: in-memory operation is complete on
//! its own, and backend failures are logged rather than surfaced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::entry::PersistedEntry;

/// Storage for cache entries
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Insert or replace an entry
    async fn save(&self, entry: &PersistedEntry) -> Result<()>;

    /// Remove an entry; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry whose key starts with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;

    /// Entries that have not expired at `now`
    async fn load_live(&self, now: DateTime<Utc>) -> Result<Vec<PersistedEntry>>;

    /// Remove entries expired at `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
