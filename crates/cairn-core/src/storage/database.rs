//! The graph file
//!
//! A single SQLite file holds nodes, relationships and persisted cache
//! entries. Opening it brings the schema up to date before anything reads it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::debug;

use crate::storage::migrations;

const FILE_POOL_SIZE: u32 = 5;
/// How long a writer waits on a locked graph file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `$DATA_DIR/cairn/graph.db`, or `cairn.db` in the working directory
pub fn default_database_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("cairn").join("graph.db"),
        None => PathBuf::from("cairn.db"),
    }
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// An open graph database
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: Location,
}

impl Database {
    /// Open (creating if needed) the graph file at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::connect(Location::File(path.into())).await
    }

    /// A private graph that lives as long as the pool
    pub async fn in_memory() -> Result<Self> {
        Self::connect(Location::Memory).await
    }

    async fn connect(location: Location) -> Result<Self> {
        let (options, pool_size) = match &location {
            Location::File(path) => {
                let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
                if let Some(parent) = parent {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create graph directory: {}", parent.display())
                    })?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal);
                (options, FILE_POOL_SIZE)
            }
            // Every connection to :memory: is its own database
            Location::Memory => (SqliteConnectOptions::from_str("sqlite::memory:")?, 1),
        };
        let options = options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open graph database: {}", location.describe()))?;

        migrations::run_migrations(&pool)
            .await
            .context("Failed to migrate graph schema")?;
        debug!(location = %location.describe(), "Graph database ready");

        Ok(Self { pool, location })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The graph file, or `None` for an in-memory graph
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Schema version recorded in the graph
    pub async fn schema_version(&self) -> Result<i32> {
        let status = migrations::migration_status(&self.pool).await?;
        Ok(status.current_version)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Location {
    fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory => ":memory:".to_string(),
        }
    }
}
