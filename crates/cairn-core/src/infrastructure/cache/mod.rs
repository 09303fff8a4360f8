//! Cache persistence implementations

mod backend;

pub use backend::SqliteCacheBackend;
