//! Query cache
//!
//! Memoizes expensive reads with TTL expiry and LRU-by-one eviction.
//!
//! - [`QueryCache`]: the cache handle (get/set/get_or_set/delete/clear/stats)
//! - [`CachedGraphQueries`]: cached subgraph, metrics, path and node lists
//! - [`CacheWarmer`]: best-effort pre-population, once or on a schedule
//! - [`CacheBackend`]: optional write-through persistence
//!
//! The cache is never authoritative. Every value can be recomputed from the
//! graph store, and invalidation is advisory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cairn_core::domain::cache::{CacheConfig, QueryCache};
//!
//! let cache = QueryCache::new(CacheConfig::default());
//! let sweeper = cache.start_sweeper();
//! let metrics: NetworkMetrics = cache
//!     .get_or_set("metrics:network", None, || engine.get_network_metrics())
//!     .await?;
//! sweeper.shutdown().await?;
//! ```

mod backend;
mod cached;
mod entry;
pub mod key;
mod stats;
mod store;
mod task;
mod warmer;

pub use backend::CacheBackend;
pub use cached::{CachedGraphQueries, spawn_invalidator};
pub use entry::{CacheEntry, MAX_TTL, PersistedEntry};
pub use key::content_key;
pub use stats::{CacheStats, OperationStats};
pub use store::{CacheConfig, QueryCache};
pub use task::{InvalidatorHandle, SweeperHandle, TaskHandle};
pub use warmer::{CacheWarmer, WarmupFailure, WarmupHandle, WarmupPlan, WarmupReport, WarmupScheduleHandle};
