//! In-memory implementation of the GraphRepository
//!
//! Nodes and relationships live in hash maps behind a tokio `RwLock`.
//! Outgoing and incoming id indexes answer endpoint lookups without
//! scanning every relationship.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::graph::{
    GraphRepository, Node, NodeQuery, Relationship, RelationshipQuery, RelationshipType,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<String, Node>,
    relationships: HashMap<String, Relationship>,
    outgoing: HashMap<String, BTreeSet<String>>,
    incoming: HashMap<String, BTreeSet<String>>,
}

impl GraphState {
    fn index(&mut self, relationship: &Relationship) {
        self.outgoing
            .entry(relationship.source_id.clone())
            .or_default()
            .insert(relationship.id.clone());
        self.incoming
            .entry(relationship.target_id.clone())
            .or_default()
            .insert(relationship.id.clone());
    }

    fn unindex(&mut self, relationship: &Relationship) {
        if let Some(ids) = self.outgoing.get_mut(&relationship.source_id) {
            ids.remove(&relationship.id);
        }
        if let Some(ids) = self.incoming.get_mut(&relationship.target_id) {
            ids.remove(&relationship.id);
        }
    }

    fn collect(&self, ids: Option<&BTreeSet<String>>) -> Vec<Relationship> {
        let mut found: Vec<Relationship> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.relationships.get(id).cloned())
            .collect();
        sort_by_weight(&mut found);
        found
    }
}

fn sort_by_weight(relationships: &mut [Relationship]) {
    relationships.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory graph repository
#[derive(Debug, Default)]
pub struct InMemoryGraphRepository {
    state: RwLock<GraphState>,
}

impl InMemoryGraphRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphRepository for InMemoryGraphRepository {
    // ========== Node Operations ==========

    async fn save_node(&self, node: &Node) -> Result<()> {
        let mut state = self.state.write().await;
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn list_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        Ok(query.apply(state.nodes.values().cloned()))
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let deleted = state.nodes.remove(id).is_some();
        if deleted {
            debug!(node_id = %id, "Node removed from memory");
        }
        Ok(deleted)
    }

    async fn count_nodes(&self) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.nodes.values().filter(|n| !n.is_deleted()).count() as u64)
    }

    // ========== Relationship Operations ==========

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(previous) = state.relationships.remove(&relationship.id) {
            state.unindex(&previous);
        }
        state.index(relationship);
        state
            .relationships
            .insert(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        Ok(self.state.read().await.relationships.get(id).cloned())
    }

    async fn get_relationship_between(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>> {
        let state = self.state.read().await;
        Ok(state
            .collect(state.outgoing.get(source_id))
            .into_iter()
            .find(|r| r.target_id == target_id && r.relationship_type == relationship_type))
    }

    async fn list_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>> {
        let state = self.state.read().await;

        // Narrow the candidate set through the endpoint indexes when possible
        let candidates: Vec<Relationship> = if let Some(source_id) = &query.filter.source_id {
            state.collect(state.outgoing.get(source_id))
        } else if let Some(target_id) = &query.filter.target_id {
            state.collect(state.incoming.get(target_id))
        } else {
            state.relationships.values().cloned().collect()
        };

        Ok(query.apply(candidates))
    }

    async fn relationships_for_node(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let state = self.state.read().await;
        let ids: BTreeSet<String> = state
            .outgoing
            .get(node_id)
            .into_iter()
            .chain(state.incoming.get(node_id))
            .flatten()
            .cloned()
            .collect();
        Ok(state.collect(Some(&ids)))
    }

    async fn outgoing_relationships(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let state = self.state.read().await;
        Ok(state.collect(state.outgoing.get(node_id)))
    }

    async fn incoming_relationships(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let state = self.state.read().await;
        Ok(state.collect(state.incoming.get(node_id)))
    }

    async fn delete_relationship(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.relationships.remove(id) {
            Some(relationship) => {
                state.unindex(&relationship);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_relationships_for_node(&self, node_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let ids: BTreeSet<String> = state
            .outgoing
            .remove(node_id)
            .unwrap_or_default()
            .into_iter()
            .chain(state.incoming.remove(node_id).unwrap_or_default())
            .collect();

        let mut removed = 0;
        for id in ids {
            if let Some(relationship) = state.relationships.remove(&id) {
                state.unindex(&relationship);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count_relationships(&self) -> Result<u64> {
        Ok(self.state.read().await.relationships.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{NodeType, Page, RelationshipFilter, ValueRange};

    async fn seeded() -> InMemoryGraphRepository {
        let repo = InMemoryGraphRepository::new();
        for id in ["a", "b", "c"] {
            repo.save_node(&Node::with_id(id, id, NodeType::Note)).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_endpoint_indexes() {
        let repo = seeded().await;
        let ab = Relationship::new("a", "b", RelationshipType::Uses).with_weight(0.5);
        let ca = Relationship::new("c", "a", RelationshipType::Uses).with_weight(2.0);
        repo.save_relationship(&ab).await.unwrap();
        repo.save_relationship(&ca).await.unwrap();

        let touching = repo.relationships_for_node("a").await.unwrap();
        assert_eq!(touching.len(), 2);
        assert_eq!(touching[0].id, ca.id, "highest weight first");

        assert_eq!(repo.outgoing_relationships("a").await.unwrap().len(), 1);
        assert_eq!(repo.incoming_relationships("a").await.unwrap().len(), 1);
        assert!(repo.relationships_for_node("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resave_moves_index() {
        let repo = seeded().await;
        let mut rel = Relationship::new("a", "b", RelationshipType::Uses);
        repo.save_relationship(&rel).await.unwrap();

        rel.target_id = "c".into();
        repo.save_relationship(&rel).await.unwrap();

        assert!(repo.incoming_relationships("b").await.unwrap().is_empty());
        assert_eq!(repo.incoming_relationships("c").await.unwrap().len(), 1);
        assert_eq!(repo.count_relationships().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_relationship_between() {
        let repo = seeded().await;
        let rel = Relationship::new("a", "b", RelationshipType::Related);
        repo.save_relationship(&rel).await.unwrap();

        let found = repo
            .get_relationship_between("a", "b", RelationshipType::Related)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(rel.id));
        assert!(
            repo.get_relationship_between("b", "a", RelationshipType::Related)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_relationships_filtered() {
        let repo = seeded().await;
        for (s, t, w) in [("a", "b", 0.2), ("a", "c", 0.8), ("b", "c", 0.9)] {
            repo.save_relationship(&Relationship::new(s, t, RelationshipType::Uses).with_weight(w))
                .await
                .unwrap();
        }

        let query = RelationshipQuery::new(
            RelationshipFilter::from_source("a").with_weight(ValueRange::at_least(0.5)),
        );
        let found = repo.list_relationships(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].target_id, "c");

        let paged = repo
            .list_relationships(&RelationshipQuery::default().paged(Page::new(2, 0)))
            .await
            .unwrap();
        assert_eq!(paged.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_relationships_for_node() {
        let repo = seeded().await;
        repo.save_relationship(&Relationship::new("a", "b", RelationshipType::Uses))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("b", "c", RelationshipType::Uses))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("a", "c", RelationshipType::Uses))
            .await
            .unwrap();

        let removed = repo.delete_relationships_for_node("b").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count_relationships().await.unwrap(), 1);
        assert!(repo.incoming_relationships("c").await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_count_excludes_soft_deleted() {
        let repo = seeded().await;
        let mut node = repo.get_node("a").await.unwrap().unwrap();
        node.deleted_at = Some(chrono::Utc::now());
        repo.save_node(&node).await.unwrap();

        assert_eq!(repo.count_nodes().await.unwrap(), 2);
        assert!(repo.delete_node("a").await.unwrap());
        assert!(!repo.delete_node("a").await.unwrap());
    }
}
