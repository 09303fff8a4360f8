//! Storage layer - SQLite
//!
//! Provides database management and migrations for cairn.
//!
//! # Architecture
//!
//! - `database`: Opening the graph file and its pool
//! - `migrations`: Schema versioning and automatic migration
//!
//! # Usage
//!
//! ```ignore
//! use cairn_core::storage::Database;
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//!
//! // Or open the graph file
//! let db = Database::open("graph.db").await?;
//! ```

pub mod database;
pub mod migrations;

pub use database::{Database, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
