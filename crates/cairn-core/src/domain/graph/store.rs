//! Graph store service
//!
//! Wraps a [`GraphRepository`] and enforces the structural rules the
//! backends do not: no self-loops, existing endpoints, optional triple
//! uniqueness and the configured deletion policy. Every mutation publishes
//! a [`GraphEvent`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::event::{EventBus, GraphEvent};
use super::filter::{NodeQuery, RelationshipQuery};
use super::node::{Node, NodePatch};
use super::relationship::{Relationship, RelationshipAttrs, RelationshipType};
use super::repository::GraphRepository;

/// What happens to relationships when their node is hard-deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Remove every relationship touching the node
    #[default]
    Cascade,
    /// Refuse to delete while relationships still reference the node
    Reject,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cascade" => Some(Self::Cascade),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Store behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Reject a second relationship with the same (source, target, type)
    #[serde(default)]
    pub enforce_unique_relationships: bool,
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

/// Graph store service
pub struct GraphStore<R: GraphRepository> {
    repository: Arc<R>,
    events: EventBus,
    options: StoreOptions,
}

impl<R: GraphRepository> GraphStore<R> {
    /// Create a new store over a repository
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            events: EventBus::new(),
            options: StoreOptions::default(),
        }
    }

    /// Set the store options
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Publish on an existing event bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    // ========== Node Operations ==========

    /// Create a node; fails if the id is already taken
    pub async fn create_node(&self, node: Node) -> Result<Node> {
        if self.repository.get_node(&node.id).await?.is_some() {
            return Err(Error::DuplicateNode(node.id));
        }
        if node.title.trim().is_empty() {
            return Err(Error::InvalidInput("node title must not be empty".into()));
        }

        self.repository.save_node(&node).await?;
        debug!(node_id = %node.id, node_type = %node.node_type, "Node created");
        self.events
            .publish(GraphEvent::node_created(&node.id, node.node_type, &node.title));
        Ok(node)
    }

    /// Insert a node, or replace an existing one while keeping its creation time
    pub async fn upsert_node(&self, mut node: Node) -> Result<Node> {
        match self.repository.get_node(&node.id).await? {
            Some(existing) => {
                node.created_at = existing.created_at;
                node.modified_at = Utc::now();
                self.repository.save_node(&node).await?;
                debug!(node_id = %node.id, "Node replaced");
                self.events
                    .publish(GraphEvent::node_updated(&node.id, vec!["replaced".into()]));
                Ok(node)
            }
            None => self.create_node(node).await,
        }
    }

    /// Get a node by id
    pub async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        self.repository.get_node(id).await
    }

    /// List nodes matching a query
    pub async fn list_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        self.repository.list_nodes(query).await
    }

    /// Apply a patch to a node
    pub async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node> {
        let mut node = self.require_node(id).await?;
        let changes = node.apply(patch);

        self.repository.save_node(&node).await?;
        debug!(node_id = %id, changes = ?changes, "Node updated");
        self.events.publish(GraphEvent::node_updated(id, changes));
        Ok(node)
    }

    /// Mark a node deleted without removing it or its relationships
    pub async fn soft_delete_node(&self, id: &str) -> Result<()> {
        let mut node = self.require_node(id).await?;
        if node.is_deleted() {
            return Ok(());
        }

        let now = Utc::now();
        node.deleted_at = Some(now);
        node.modified_at = now;
        self.repository.save_node(&node).await?;
        info!(node_id = %id, "Node soft-deleted");
        self.events.publish(GraphEvent::node_deleted(id, true));
        Ok(())
    }

    /// Clear the soft-delete marker
    pub async fn restore_node(&self, id: &str) -> Result<Node> {
        let mut node = self.require_node(id).await?;
        if node.deleted_at.take().is_some() {
            node.modified_at = Utc::now();
            self.repository.save_node(&node).await?;
            self.events
                .publish(GraphEvent::node_updated(id, vec!["restored".into()]));
        }
        Ok(node)
    }

    /// Hard-delete a node according to the delete policy
    pub async fn delete_node(&self, id: &str) -> Result<()> {
        self.require_node(id).await?;

        let touching = self.repository.relationships_for_node(id).await?;
        if !touching.is_empty() {
            match self.options.delete_policy {
                DeletePolicy::Reject => {
                    return Err(Error::DanglingRelationships {
                        id: id.to_string(),
                        count: touching.len() as u64,
                    });
                }
                DeletePolicy::Cascade => {
                    let removed = self.repository.delete_relationships_for_node(id).await?;
                    debug!(node_id = %id, removed, "Cascaded relationship deletion");
                    for rel in &touching {
                        self.events.publish(GraphEvent::relationship_deleted(
                            &rel.id,
                            &rel.source_id,
                            &rel.target_id,
                        ));
                    }
                }
            }
        }

        self.repository.delete_node(id).await?;
        info!(node_id = %id, "Node deleted");
        self.events.publish(GraphEvent::node_deleted(id, false));
        Ok(())
    }

    pub async fn count_nodes(&self) -> Result<u64> {
        self.repository.count_nodes().await
    }

    // ========== Relationship Operations ==========

    /// Create a relationship between two existing nodes
    pub async fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
        attrs: RelationshipAttrs,
    ) -> Result<Relationship> {
        let relationship =
            Relationship::new(source_id, target_id, relationship_type).with_attrs(attrs);
        self.add_relationship(relationship).await
    }

    /// Insert a fully built relationship after structural checks
    pub async fn add_relationship(&self, relationship: Relationship) -> Result<Relationship> {
        if relationship.is_self_loop() {
            return Err(Error::StructuralViolation(format!(
                "relationship source and target are both '{}'",
                relationship.source_id
            )));
        }

        for endpoint in [&relationship.source_id, &relationship.target_id] {
            if self.repository.get_node(endpoint).await?.is_none() {
                return Err(Error::NodeNotFound(endpoint.clone()));
            }
        }

        if self.options.enforce_unique_relationships
            && self
                .repository
                .get_relationship_between(
                    &relationship.source_id,
                    &relationship.target_id,
                    relationship.relationship_type,
                )
                .await?
                .is_some()
        {
            return Err(Error::DuplicateRelationship {
                source_id: relationship.source_id,
                target_id: relationship.target_id,
                relationship_type: relationship.relationship_type.to_string(),
            });
        }

        self.repository.save_relationship(&relationship).await?;
        debug!(
            relationship_id = %relationship.id,
            source = %relationship.source_id,
            target = %relationship.target_id,
            relationship_type = %relationship.relationship_type,
            "Relationship created"
        );
        self.events.publish(GraphEvent::relationship_created(
            &relationship.id,
            &relationship.source_id,
            &relationship.target_id,
            relationship.relationship_type,
        ));
        Ok(relationship)
    }

    /// Get a relationship by id
    pub async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        self.repository.get_relationship(id).await
    }

    /// Search relationships
    pub async fn find_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>> {
        self.repository.list_relationships(query).await
    }

    /// All relationships touching a node
    pub async fn relationships_for_node(&self, node_id: &str) -> Result<Vec<Relationship>> {
        self.repository.relationships_for_node(node_id).await
    }

    /// Update relationship attributes
    pub async fn update_relationship(&self, id: &str, attrs: RelationshipAttrs) -> Result<Relationship> {
        let mut relationship = self
            .repository
            .get_relationship(id)
            .await?
            .ok_or_else(|| Error::RelationshipNotFound(id.to_string()))?;

        relationship.apply(attrs);
        self.repository.save_relationship(&relationship).await?;
        debug!(relationship_id = %id, "Relationship updated");
        self.events.publish(GraphEvent::relationship_updated(
            id,
            &relationship.source_id,
            &relationship.target_id,
        ));
        Ok(relationship)
    }

    /// Delete a relationship
    pub async fn delete_relationship(&self, id: &str) -> Result<()> {
        let relationship = self
            .repository
            .get_relationship(id)
            .await?
            .ok_or_else(|| Error::RelationshipNotFound(id.to_string()))?;

        self.repository.delete_relationship(id).await?;
        self.events.publish(GraphEvent::relationship_deleted(
            id,
            &relationship.source_id,
            &relationship.target_id,
        ));
        Ok(())
    }

    pub async fn count_relationships(&self) -> Result<u64> {
        self.repository.count_relationships().await
    }

    async fn require_node(&self, id: &str) -> Result<Node> {
        self.repository
            .get_node(id)
            .await?
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }
}
