//! Cairn Core Library
//!
//! This crate provides the core functionality for Cairn, including:
//! - Graph store (typed nodes, weighted relationships, mutation events)
//! - Query engine (subgraphs, paths, metrics, diameter, suggestions)
//! - Query cache (TTL + LRU, warm-up, advisory invalidation)
//! - Import pipeline (adapter registry, Obsidian vaults)
//! - Storage (SQLite + migrations)

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::cache::{CacheConfig, CachedGraphQueries, QueryCache};
    pub use crate::domain::graph::{
        GraphRepository, GraphStore, Node, NodeQuery, NodeType, Relationship, RelationshipAttrs,
        RelationshipType,
    };
    pub use crate::domain::import::{AdapterRegistry, ImportOptions, ImportPipeline};
    pub use crate::domain::query::{GraphQueryEngine, PathOptions, SubgraphOptions};
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::{InMemoryGraphRepository, SqliteGraphRepository};
    pub use crate::storage::Database;
}
