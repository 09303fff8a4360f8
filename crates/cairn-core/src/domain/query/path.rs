//! Path finding types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::graph::{Relationship, RelationshipType, TypeFilter};

/// Upper bound on edge expansions for a single weighted search
pub const WEIGHTED_EXPANSION_BUDGET: usize = 10_000;

/// Path ranking mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAlgorithm {
    /// Minimum hop count (breadth-first)
    #[default]
    Shortest,
    /// Prefer heavier edges at every step (depth-first)
    Weighted,
}

impl PathAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shortest => "shortest",
            Self::Weighted => "weighted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "shortest" => Some(Self::Shortest),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }
}

impl fmt::Display for PathAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for [`GraphQueryEngine::find_path`](super::GraphQueryEngine::find_path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathOptions {
    /// Maximum number of hops
    pub max_depth: usize,
    #[serde(default)]
    pub algorithm: PathAlgorithm,
    #[serde(default)]
    pub relationship_types: TypeFilter<RelationshipType>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            algorithm: PathAlgorithm::Shortest,
            relationship_types: TypeFilter::default(),
        }
    }
}

impl PathOptions {
    pub fn shortest(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    pub fn weighted(max_depth: usize) -> Self {
        Self {
            max_depth,
            algorithm: PathAlgorithm::Weighted,
            ..Default::default()
        }
    }

    pub fn with_relationship_types(mut self, filter: TypeFilter<RelationshipType>) -> Self {
        self.relationship_types = filter;
        self
    }
}

/// One node on a path, with the relationship used to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub node_id: String,
    /// `None` for the first step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<Relationship>,
}

impl PathStep {
    pub fn start(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            via: None,
        }
    }

    pub fn via(node_id: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            node_id: node_id.into(),
            via: Some(relationship),
        }
    }
}

/// Sum of the weights along a path
pub fn path_weight(path: &[PathStep]) -> f64 {
    path.iter()
        .filter_map(|step| step.via.as_ref())
        .map(|r| r.weight)
        .sum()
}
