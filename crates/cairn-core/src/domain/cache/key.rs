//! Cache key construction
//!
//! Query keys are `operation:arguments`. The operation prefix drives the
//! per-operation statistics and prefix invalidation.

use sha2::{Digest, Sha256};

use crate::domain::query::{PathOptions, SubgraphOptions};

pub const SUBGRAPH_PREFIX: &str = "subgraph:";
pub const METRICS_PREFIX: &str = "metrics:";
pub const POPULAR_PREFIX: &str = "popular:";
pub const RECENT_PREFIX: &str = "recent:";
pub const PATH_PREFIX: &str = "path:";
pub const ANALYSIS_PREFIX: &str = "analysis:";

/// Prefixes whose values summarize the whole graph
pub const AGGREGATE_PREFIXES: &[&str] = &[METRICS_PREFIX, POPULAR_PREFIX, RECENT_PREFIX, PATH_PREFIX];

/// Content-addressed key: identical content and version always share a slot
pub fn content_key(content: &str, model_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_version.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{}{}", ANALYSIS_PREFIX, hex::encode(hasher.finalize()))
}

pub fn subgraph_key(node_id: &str, options: &SubgraphOptions) -> String {
    format!("{}{}", subgraph_prefix(node_id), options.cache_fingerprint())
}

/// Prefix shared by every cached subgraph seeded at `node_id`
pub fn subgraph_prefix(node_id: &str) -> String {
    format!("{}{}:", SUBGRAPH_PREFIX, node_id)
}

pub fn metrics_key() -> String {
    format!("{}network", METRICS_PREFIX)
}

pub fn popular_key(limit: usize) -> String {
    format!("{}{}", POPULAR_PREFIX, limit)
}

pub fn recent_key(limit: usize) -> String {
    format!("{}{}", RECENT_PREFIX, limit)
}

pub fn path_key(source_id: &str, target_id: &str, options: &PathOptions) -> String {
    let types = |values: &[crate::domain::graph::RelationshipType]| {
        values.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(",")
    };
    format!(
        "{}{}:{}:{}:{}:+{}-{}",
        PATH_PREFIX,
        source_id,
        target_id,
        options.algorithm,
        options.max_depth,
        types(&options.relationship_types.include),
        types(&options.relationship_types.exclude),
    )
}

/// Operation name of a key: the text before the first `:`, or `other`
pub fn operation_of(key: &str) -> &str {
    match key.split_once(':') {
        Some((operation, _)) if !operation.is_empty() => operation,
        _ => "other",
    }
}
