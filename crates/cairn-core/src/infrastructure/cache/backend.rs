//! SQLite implementation of the CacheBackend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::cache::{CacheBackend, PersistedEntry};
use crate::error::Result;
use crate::infrastructure::graph::{format_timestamp, parse_timestamp};

/// Cache entries stored in the `cache_entries` table
#[derive(Clone)]
pub struct SqliteCacheBackend {
    pool: SqlitePool,
}

impl SqliteCacheBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn save(&self, entry: &PersistedEntry) -> Result<()> {
        let value_json = serde_json::to_string(&entry.value)?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, size_bytes, hits, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                size_bytes = excluded.size_bytes,
                hits = excluded.hits,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&entry.key)
        .bind(&value_json)
        .bind(entry.size_bytes as i64)
        .bind(entry.hits as i64)
        .bind(format_timestamp(&entry.created_at))
        .bind(format_timestamp(&entry.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE substr(key, 1, ?) = ?")
            .bind(prefix.chars().count() as i64)
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_live(&self, now: DateTime<Utc>) -> Result<Vec<PersistedEntry>> {
        let rows: Vec<CacheEntryRow> = sqlx::query_as(
            "SELECT * FROM cache_entries WHERE expires_at > ? ORDER BY created_at",
        )
        .bind(format_timestamp(&now))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!(error = %e, "Skipping unreadable cache row"),
            }
        }
        Ok(entries)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(format_timestamp(&now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, FromRow)]
struct CacheEntryRow {
    key: String,
    value: String,
    size_bytes: i64,
    hits: i64,
    created_at: String,
    expires_at: String,
}

impl CacheEntryRow {
    fn into_entry(self) -> Result<PersistedEntry> {
        Ok(PersistedEntry {
            key: self.key,
            value: serde_json::from_str(&self.value)?,
            size_bytes: self.size_bytes.max(0) as usize,
            hits: self.hits.max(0) as u64,
            created_at: parse_timestamp(&self.created_at),
            expires_at: parse_timestamp(&self.expires_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheConfig, QueryCache};
    use crate::storage::Database;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn backend() -> SqliteCacheBackend {
        let db = Database::in_memory().await.unwrap();
        SqliteCacheBackend::new(db.pool().clone())
    }

    fn entry(key: &str, expires_in_secs: i64) -> PersistedEntry {
        let now = Utc::now();
        PersistedEntry {
            key: key.to_string(),
            value: json!({"key": key}),
            size_bytes: 10,
            hits: 0,
            created_at: now,
            expires_at: now + ChronoDuration::seconds(expires_in_secs),
        }
    }

    #[tokio::test]
    async fn test_save_load_and_purge() {
        let backend = backend().await;
        backend.save(&entry("live", 60)).await.unwrap();
        backend.save(&entry("stale", -60)).await.unwrap();

        let live = backend.load_live(Utc::now()).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].key, "live");
        assert_eq!(live[0].value, json!({"key": "live"}));

        assert_eq!(backend.purge_expired(Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_prefix() {
        let backend = backend().await;
        for key in ["subgraph:a:1", "subgraph:a:2", "subgraph:ab:1", "metrics:network"] {
            backend.save(&entry(key, 60)).await.unwrap();
        }

        assert_eq!(backend.delete_prefix("subgraph:a:").await.unwrap(), 2);
        assert!(backend.delete("metrics:network").await.unwrap());
        assert!(!backend.delete("metrics:network").await.unwrap());

        backend.clear().await.unwrap();
        assert!(backend.load_live(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_write_through_and_restore() {
        let db = Database::in_memory().await.unwrap();
        let backend = Arc::new(SqliteCacheBackend::new(db.pool().clone()));
        let config = CacheConfig {
            max_entries: 10,
            default_ttl: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
        };

        let cache = QueryCache::new(config.clone()).with_backend(backend.clone());
        cache.set("metrics:network", json!({"density": 0.5}), None).await;
        cache.set("popular:10", json!(["a"]), None).await;
        cache.delete("popular:10").await;
        assert_eq!(cache.flush().await.unwrap(), 1);

        let fresh = QueryCache::new(config).with_backend(backend);
        assert_eq!(fresh.restore().await.unwrap(), 1);
        assert_eq!(fresh.get("metrics:network").await, Some(json!({"density": 0.5})));
    }
}
