//! Repository trait for graph persistence
//!
//! The trait abstracts over storage backends (in-memory, SQLite). Backends
//! must answer "all relationships touching node X" efficiently, since
//! traversal pivots on it repeatedly.

use async_trait::async_trait;

use crate::error::Result;

use super::filter::{NodeQuery, RelationshipQuery};
use super::node::Node;
use super::relationship::{Relationship, RelationshipType};

/// Repository trait for graph persistence
#[async_trait]
pub trait GraphRepository: Send + Sync {
    // ========== Node Operations ==========

    /// Save a node (insert or update)
    async fn save_node(&self, node: &Node) -> Result<()>;

    /// Get a node by ID, including soft-deleted nodes
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// List nodes matching a query
    async fn list_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>>;

    /// Delete a node by ID
    async fn delete_node(&self, id: &str) -> Result<bool>;

    /// Count nodes, excluding soft-deleted ones
    async fn count_nodes(&self) -> Result<u64>;

    // ========== Relationship Operations ==========

    /// Save a relationship (insert or update by id)
    async fn save_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Get a relationship by ID
    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>>;

    /// Get a relationship between two nodes with a specific type
    async fn get_relationship_between(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>>;

    /// List relationships matching a query
    async fn list_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>>;

    /// List all relationships for a node (as source or target)
    async fn relationships_for_node(&self, node_id: &str) -> Result<Vec<Relationship>>;

    /// List outgoing relationships from a node
    async fn outgoing_relationships(&self, node_id: &str) -> Result<Vec<Relationship>>;

    /// List incoming relationships to a node
    async fn incoming_relationships(&self, node_id: &str) -> Result<Vec<Relationship>>;

    /// Delete a relationship by ID
    async fn delete_relationship(&self, id: &str) -> Result<bool>;

    /// Delete every relationship touching a node, returning how many were removed
    async fn delete_relationships_for_node(&self, node_id: &str) -> Result<u64>;

    /// Count relationships
    async fn count_relationships(&self) -> Result<u64>;
}
