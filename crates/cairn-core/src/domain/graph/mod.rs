//! Graph store domain
//!
//! Typed nodes and weighted, typed, directed relationships, together with
//! the repository abstraction and the store service that enforces the
//! structural rules:
//!
//! - **No self-loops**: a relationship's source and target always differ
//! - **Existing endpoints**: both ends must resolve to stored nodes
//! - **Optional uniqueness**: (source, target, type) triples can be made unique
//! - **Deletion policy**: hard deletes cascade or are rejected
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cairn_core::domain::graph::{GraphStore, Node, NodeType, RelationshipAttrs, RelationshipType};
//!
//! let store = GraphStore::new(repository);
//! let a = store.create_node(Node::new("Ownership", NodeType::Concept)).await?;
//! let b = store.create_node(Node::new("Borrowing", NodeType::Concept)).await?;
//! store
//!     .create_relationship(&a.id, &b.id, RelationshipType::Related, RelationshipAttrs::default())
//!     .await?;
//! ```

mod event;
mod filter;
mod node;
mod relationship;
mod repository;
mod store;

pub use event::{EventBus, GraphEvent};
pub use filter::{
    NodeQuery, NodeSortField, Page, RelationshipFilter, RelationshipQuery, RelationshipSortField,
    SortDirection, TimeRange, TypeFilter, ValueRange,
};
pub use node::{Node, NodePatch, NodeType};
pub use relationship::{Relationship, RelationshipAttrs, RelationshipType};
pub use repository::GraphRepository;
pub use store::{DeletePolicy, GraphStore, StoreOptions};
