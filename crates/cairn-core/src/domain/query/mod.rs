//! Graph query engine
//!
//! Read-only algorithms over the graph store:
//!
//! - **Subgraph extraction**: bounded breadth-first neighborhood of a seed
//! - **Path finding**: cycle-free shortest or weight-preferring paths
//! - **Network metrics**: density, degree distribution, weight statistics
//! - **Suggestions**: tag/type/author heuristic for missing relationships
//! - **Diameter**: bounded eccentricity search with lower-bound signaling
//!
//! Empty results (unknown seed, no path) are valid outcomes, not errors.

mod diameter;
mod engine;
mod metrics;
mod path;
mod snapshot;
mod subgraph;
mod suggest;

pub use diameter::{DiameterOptions, DiameterReport};
pub use engine::GraphQueryEngine;
pub use metrics::{DegreeEntry, NetworkMetrics, TOP_NODE_COUNT, WeightStats, density};
pub use path::{PathAlgorithm, PathOptions, PathStep, WEIGHTED_EXPANSION_BUDGET, path_weight};
pub use subgraph::{MAX_NODE_SIZE, MIN_NODE_SIZE, Subgraph, SubgraphNode, SubgraphOptions, node_size};
pub use suggest::{MIN_SUGGESTION_SCORE, Suggestion, SuggestionOutcome, score_candidate, tag_similarity};
