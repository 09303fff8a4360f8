//! Bounded neighborhood extraction types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::graph::{Node, NodeType, Relationship, RelationshipType, TypeFilter};

/// Smallest rendering size for a subgraph node
pub const MIN_NODE_SIZE: u32 = 10;
/// Largest rendering size for a subgraph node
pub const MAX_NODE_SIZE: u32 = 30;

/// Options for [`GraphQueryEngine::get_subgraph`](super::GraphQueryEngine::get_subgraph)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphOptions {
    /// Maximum number of hops from the seed
    pub depth: usize,
    /// Maximum number of nodes returned, seed included
    pub max_nodes: usize,
    #[serde(default)]
    pub node_types: TypeFilter<NodeType>,
    #[serde(default)]
    pub relationship_types: TypeFilter<RelationshipType>,
    /// Relationships lighter than this are not followed
    #[serde(default)]
    pub weight_floor: f64,
    /// Wall-clock budget for the traversal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
}

impl Default for SubgraphOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            max_nodes: 100,
            node_types: TypeFilter::default(),
            relationship_types: TypeFilter::default(),
            weight_floor: 0.0,
            deadline: None,
        }
    }
}

impl SubgraphOptions {
    pub fn new(depth: usize, max_nodes: usize) -> Self {
        Self {
            depth,
            max_nodes,
            ..Default::default()
        }
    }

    pub fn with_weight_floor(mut self, weight_floor: f64) -> Self {
        self.weight_floor = weight_floor;
        self
    }

    pub fn with_node_types(mut self, filter: TypeFilter<NodeType>) -> Self {
        self.node_types = filter;
        self
    }

    pub fn with_relationship_types(mut self, filter: TypeFilter<RelationshipType>) -> Self {
        self.relationship_types = filter;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether a relationship may be followed
    pub(crate) fn follows(&self, relationship: &Relationship) -> bool {
        relationship.weight >= self.weight_floor
            && self.relationship_types.allows(&relationship.relationship_type)
    }

    /// Stable fingerprint used in cache keys
    pub fn cache_fingerprint(&self) -> String {
        let types = |include: Vec<&str>, exclude: Vec<&str>| {
            format!("+{}-{}", include.join(","), exclude.join(","))
        };
        format!(
            "d{}:n{}:w{}:nt{}:rt{}",
            self.depth,
            self.max_nodes,
            self.weight_floor,
            types(
                self.node_types.include.iter().map(|t| t.as_str()).collect(),
                self.node_types.exclude.iter().map(|t| t.as_str()).collect()
            ),
            types(
                self.relationship_types.include.iter().map(|t| t.as_str()).collect(),
                self.relationship_types.exclude.iter().map(|t| t.as_str()).collect()
            ),
        )
    }
}

/// A node placed in a subgraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphNode {
    pub node: Node,
    /// Hops from the seed
    pub depth: usize,
    /// Edges inside the returned subgraph touching this node
    pub degree: usize,
    /// Rendering hint
    pub size: u32,
}

/// Result of a subgraph extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub seed_id: String,
    /// Nodes ordered by (depth, title, id)
    pub nodes: Vec<SubgraphNode>,
    pub relationships: Vec<Relationship>,
    /// The result may omit reachable nodes (node limit or deadline)
    pub truncated: bool,
}

impl Subgraph {
    pub fn empty(seed_id: impl Into<String>) -> Self {
        Self {
            seed_id: seed_id.into(),
            nodes: Vec::new(),
            relationships: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.node.id == node_id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.node.id.as_str()).collect()
    }
}

/// Rendering size from in-subgraph degree
pub fn node_size(degree: usize) -> u32 {
    let raw = MIN_NODE_SIZE as usize + 2 * degree;
    raw.clamp(MIN_NODE_SIZE as usize, MAX_NODE_SIZE as usize) as u32
}
