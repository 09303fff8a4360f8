//! Infrastructure layer
//!
//! Contains implementations of the domain repository and backend traits.

pub mod cache;
pub mod graph;
pub mod memory;

pub use cache::SqliteCacheBackend;
pub use graph::SqliteGraphRepository;
pub use memory::InMemoryGraphRepository;
