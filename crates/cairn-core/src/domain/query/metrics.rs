//! Whole-graph connectivity statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::snapshot::GraphSnapshot;

/// Number of nodes listed in [`NetworkMetrics::top_nodes`]
pub const TOP_NODE_COUNT: usize = 10;

/// A node and its total degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeEntry {
    pub node_id: String,
    pub title: String,
    pub degree: usize,
}

/// Relationship weight distribution; all zero for an edgeless graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub median: f64,
}

impl WeightStats {
    fn from_weights(mut weights: Vec<f64>) -> Self {
        if weights.is_empty() {
            return Self::default();
        }
        weights.sort_by(|a, b| a.total_cmp(b));

        let len = weights.len();
        let median = if len % 2 == 0 {
            (weights[len / 2 - 1] + weights[len / 2]) / 2.0
        } else {
            weights[len / 2]
        };

        Self {
            min: weights[0],
            max: weights[len - 1],
            average: weights.iter().sum::<f64>() / len as f64,
            median,
        }
    }
}

/// Aggregate statistics over the live graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// `2E / (N(N-1))`, zero when fewer than two nodes
    pub density: f64,
    pub average_degree: f64,
    pub max_degree: usize,
    pub top_nodes: Vec<DegreeEntry>,
    /// Relationship count per type name
    pub relationship_types: BTreeMap<String, usize>,
    pub weights: WeightStats,
    /// Density reported in place of a true clustering coefficient
    pub clustering_estimate: f64,
    /// Always true: `clustering_estimate` is not transitivity
    pub clustering_is_approximation: bool,
}

/// Graph density for `nodes` vertices and `edges` relationships
pub fn density(nodes: usize, edges: usize) -> f64 {
    if nodes > 1 {
        (2 * edges) as f64 / (nodes * (nodes - 1)) as f64
    } else {
        0.0
    }
}

pub(crate) fn compute(snapshot: &GraphSnapshot) -> NetworkMetrics {
    let node_count = snapshot.node_count();
    let edge_count = snapshot.edge_count();
    let density = density(node_count, edge_count);

    let ranked = snapshot.ranked_by_degree();
    let max_degree = ranked.first().map(|(_, d)| *d).unwrap_or(0);
    let average_degree = if node_count > 0 {
        (2 * edge_count) as f64 / node_count as f64
    } else {
        0.0
    };

    let top_nodes = ranked
        .into_iter()
        .take(TOP_NODE_COUNT)
        .map(|(node, degree)| DegreeEntry {
            node_id: node.id.clone(),
            title: node.title.clone(),
            degree,
        })
        .collect();

    let mut relationship_types = BTreeMap::new();
    for relationship in &snapshot.relationships {
        *relationship_types
            .entry(relationship.relationship_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    let weights =
        WeightStats::from_weights(snapshot.relationships.iter().map(|r| r.weight).collect());

    NetworkMetrics {
        node_count,
        edge_count,
        density,
        average_degree,
        max_degree,
        top_nodes,
        relationship_types,
        weights,
        clustering_estimate: density,
        clustering_is_approximation: true,
    }
}
