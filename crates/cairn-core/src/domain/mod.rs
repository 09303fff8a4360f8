//! Domain layer
//!
//! Contains the core graph model, the query and cache services built on it,
//! and the import pipeline that feeds it.

pub mod cache;
pub mod graph;
pub mod import;
pub mod query;
pub mod specification;
