//! In-memory view of the live graph used by whole-graph computations

use std::collections::{BTreeSet, HashMap};

use crate::domain::graph::{GraphRepository, Node, NodeQuery, Relationship, RelationshipQuery};
use crate::error::Result;

/// Live nodes plus the relationships between them, with an undirected adjacency index
#[derive(Debug, Default)]
pub(crate) struct GraphSnapshot {
    pub nodes: HashMap<String, Node>,
    pub relationships: Vec<Relationship>,
    adjacency: HashMap<String, BTreeSet<String>>,
    degrees: HashMap<String, usize>,
}

impl GraphSnapshot {
    /// Load every live node and every relationship whose endpoints are both live
    pub async fn load<R: GraphRepository + ?Sized>(repository: &R) -> Result<Self> {
        let nodes: HashMap<String, Node> = repository
            .list_nodes(&NodeQuery::default())
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let relationships: Vec<Relationship> = repository
            .list_relationships(&RelationshipQuery::default())
            .await?
            .into_iter()
            .filter(|r| nodes.contains_key(&r.source_id) && nodes.contains_key(&r.target_id))
            .collect();

        Ok(Self::from_parts(nodes, relationships))
    }

    pub fn from_parts(nodes: HashMap<String, Node>, relationships: Vec<Relationship>) -> Self {
        let mut adjacency: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut degrees: HashMap<String, usize> = HashMap::new();

        for relationship in &relationships {
            adjacency
                .entry(relationship.source_id.clone())
                .or_default()
                .insert(relationship.target_id.clone());
            adjacency
                .entry(relationship.target_id.clone())
                .or_default()
                .insert(relationship.source_id.clone());
            *degrees.entry(relationship.source_id.clone()).or_default() += 1;
            *degrees.entry(relationship.target_id.clone()).or_default() += 1;
        }

        Self {
            nodes,
            relationships,
            adjacency,
            degrees,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.relationships.len()
    }

    /// In-degree plus out-degree
    pub fn degree(&self, node_id: &str) -> usize {
        self.degrees.get(node_id).copied().unwrap_or(0)
    }

    /// Distinct neighbors in either direction
    pub fn neighbors<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.adjacency
            .get(node_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Node ids in stable order
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Nodes ranked by degree, ties broken by title then id
    pub fn ranked_by_degree(&self) -> Vec<(&Node, usize)> {
        let mut ranked: Vec<(&Node, usize)> = self
            .nodes
            .values()
            .map(|n| (n, self.degree(&n.id)))
            .collect();
        ranked.sort_by(|(a, da), (b, db)| {
            db.cmp(da)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{NodeType, RelationshipType};
    use crate::infrastructure::memory::InMemoryGraphRepository;
    use chrono::Utc;

    #[tokio::test]
    async fn test_load_skips_deleted_endpoints() {
        let repo = InMemoryGraphRepository::new();
        for id in ["a", "b", "c"] {
            repo.save_node(&Node::with_id(id, id, NodeType::Note)).await.unwrap();
        }
        let mut gone = Node::with_id("d", "d", NodeType::Note);
        gone.deleted_at = Some(Utc::now());
        repo.save_node(&gone).await.unwrap();

        repo.save_relationship(&Relationship::new("a", "b", RelationshipType::Uses))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("b", "a", RelationshipType::Related))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("a", "d", RelationshipType::Uses))
            .await
            .unwrap();

        let snapshot = GraphSnapshot::load(&repo).await.unwrap();
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.edge_count(), 2);
        assert_eq!(snapshot.degree("a"), 2);
        assert_eq!(snapshot.neighbors("a").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(snapshot.degree("c"), 0);

        let ranked = snapshot.ranked_by_degree();
        assert_eq!(ranked[0].0.id, "a");
        assert_eq!(ranked[2].0.id, "c");
    }
}
