//! Graph query engine
//!
//! Read-only algorithms over a [`GraphRepository`]. Traversals pivot on the
//! repository's endpoint lookups; whole-graph computations load a snapshot.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::graph::{GraphRepository, Node, NodeQuery, NodeSortField, Page, Relationship, SortDirection};
use crate::error::{Error, Result};

use super::diameter::{self, DiameterOptions, DiameterReport};
use super::metrics::{self, DegreeEntry, NetworkMetrics};
use super::path::{PathAlgorithm, PathOptions, PathStep, WEIGHTED_EXPANSION_BUDGET};
use super::snapshot::GraphSnapshot;
use super::subgraph::{Subgraph, SubgraphNode, SubgraphOptions, node_size};
use super::suggest::{self, SuggestionOutcome};

/// Read-only query service over a graph repository
pub struct GraphQueryEngine<R: GraphRepository> {
    repository: Arc<R>,
}

impl<R: GraphRepository> Clone for GraphQueryEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

/// Memoized per-query reads so each node and edge list is fetched once
struct Lookups<'a, R: GraphRepository> {
    repository: &'a R,
    nodes: HashMap<String, Option<Node>>,
    incident: HashMap<String, Vec<Relationship>>,
}

impl<'a, R: GraphRepository> Lookups<'a, R> {
    fn new(repository: &'a R) -> Self {
        Self {
            repository,
            nodes: HashMap::new(),
            incident: HashMap::new(),
        }
    }

    /// A live (not soft-deleted) node, if any
    async fn live_node(&mut self, id: &str) -> Result<Option<&Node>> {
        if !self.nodes.contains_key(id) {
            let node = self
                .repository
                .get_node(id)
                .await?
                .filter(|n| !n.is_deleted());
            self.nodes.insert(id.to_string(), node);
        }
        Ok(self.nodes.get(id).and_then(Option::as_ref))
    }

    /// Relationships touching `id`, heaviest first
    async fn incident(&mut self, id: &str) -> Result<&[Relationship]> {
        if !self.incident.contains_key(id) {
            let relationships = self.repository.relationships_for_node(id).await?;
            self.incident.insert(id.to_string(), relationships);
        }
        Ok(self.incident.get(id).map(Vec::as_slice).unwrap_or(&[]))
    }
}

impl<R: GraphRepository> GraphQueryEngine<R> {
    /// Create a new query engine
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    // ========== Subgraph Extraction ==========

    /// Extract the bounded neighborhood around `node_id`
    pub async fn get_subgraph(&self, node_id: &str, options: &SubgraphOptions) -> Result<Subgraph> {
        let started = Instant::now();
        let mut lookups = Lookups::new(self.repository.as_ref());

        let Some(seed) = lookups.live_node(node_id).await?.cloned() else {
            debug!(node_id = %node_id, "Subgraph seed not found");
            return Ok(Subgraph::empty(node_id));
        };

        let mut placed: HashMap<String, (Node, usize)> = HashMap::new();
        placed.insert(seed.id.clone(), (seed, 0));
        let mut frontier = vec![node_id.to_string()];
        let mut truncated = false;

        for depth in 1..=options.depth {
            if options.deadline.is_some_and(|budget| started.elapsed() >= budget) {
                truncated = true;
                break;
            }

            let mut level: BTreeMap<(String, String), Node> = BTreeMap::new();
            for current in &frontier {
                let neighbors: Vec<String> = lookups
                    .incident(current)
                    .await?
                    .iter()
                    .filter(|r| options.follows(r))
                    .filter_map(|r| r.other_end(current))
                    .map(str::to_string)
                    .collect();

                for neighbor in neighbors {
                    if placed.contains_key(&neighbor) {
                        continue;
                    }
                    let Some(node) = lookups.live_node(&neighbor).await? else {
                        continue;
                    };
                    if !options.node_types.allows(&node.node_type) {
                        continue;
                    }
                    level
                        .entry((node.title.clone(), node.id.clone()))
                        .or_insert_with(|| node.clone());
                }
            }

            if level.is_empty() {
                break;
            }
            // Full, and at least one reachable node is left out
            if placed.len() >= options.max_nodes {
                truncated = true;
                break;
            }
            frontier = level.values().map(|n| n.id.clone()).collect();
            for node in level.into_values() {
                placed.insert(node.id.clone(), (node, depth));
            }
        }

        // Order by (depth, title, id) and truncate before resolving edges
        let mut ordered: Vec<(Node, usize)> = placed.into_values().collect();
        ordered.sort_by(|(a, da), (b, db)| {
            da.cmp(db)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        if ordered.len() > options.max_nodes {
            ordered.truncate(options.max_nodes);
            truncated = true;
        }

        let kept: HashSet<String> = ordered.iter().map(|(n, _)| n.id.clone()).collect();
        let mut edges: BTreeMap<String, Relationship> = BTreeMap::new();
        for (node, _) in &ordered {
            for relationship in lookups.incident(&node.id).await? {
                if options.follows(relationship)
                    && kept.contains(&relationship.source_id)
                    && kept.contains(&relationship.target_id)
                {
                    edges
                        .entry(relationship.id.clone())
                        .or_insert_with(|| relationship.clone());
                }
            }
        }
        let relationships: Vec<Relationship> = edges.into_values().collect();

        let mut degrees: HashMap<&str, usize> = HashMap::new();
        for relationship in &relationships {
            *degrees.entry(relationship.source_id.as_str()).or_default() += 1;
            *degrees.entry(relationship.target_id.as_str()).or_default() += 1;
        }
        let nodes: Vec<SubgraphNode> = ordered
            .into_iter()
            .map(|(node, depth)| {
                let degree = degrees.get(node.id.as_str()).copied().unwrap_or(0);
                SubgraphNode {
                    node,
                    depth,
                    degree,
                    size: node_size(degree),
                }
            })
            .collect();

        debug!(
            node_id = %node_id,
            nodes = nodes.len(),
            relationships = relationships.len(),
            truncated = truncated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Subgraph extracted"
        );

        Ok(Subgraph {
            seed_id: node_id.to_string(),
            nodes,
            relationships,
            truncated,
        })
    }

    // ========== Path Finding ==========

    /// Find a cycle-free path from `source_id` to `target_id`
    ///
    /// Returns an empty vector when no path exists within `max_depth` hops.
    pub async fn find_path(
        &self,
        source_id: &str,
        target_id: &str,
        options: &PathOptions,
    ) -> Result<Vec<PathStep>> {
        let mut lookups = Lookups::new(self.repository.as_ref());

        if lookups.live_node(source_id).await?.is_none()
            || lookups.live_node(target_id).await?.is_none()
        {
            return Ok(Vec::new());
        }
        if source_id == target_id {
            return Ok(vec![PathStep::start(source_id)]);
        }

        let path = match options.algorithm {
            PathAlgorithm::Shortest => {
                self.breadth_first(&mut lookups, source_id, target_id, options)
                    .await?
            }
            PathAlgorithm::Weighted => {
                self.depth_first(&mut lookups, source_id, target_id, options)
                    .await?
            }
        };

        debug!(
            source = %source_id,
            target = %target_id,
            algorithm = %options.algorithm,
            hops = path.len().saturating_sub(1),
            "Path search completed"
        );
        Ok(path)
    }

    /// Whether `b` is reachable from `a` within `max_depth` hops, ignoring direction
    pub async fn are_connected(&self, a: &str, b: &str, max_depth: usize) -> Result<bool> {
        let path = self.find_path(a, b, &PathOptions::shortest(max_depth)).await?;
        Ok(!path.is_empty())
    }

    async fn breadth_first(
        &self,
        lookups: &mut Lookups<'_, R>,
        source_id: &str,
        target_id: &str,
        options: &PathOptions,
    ) -> Result<Vec<PathStep>> {
        let mut parents: HashMap<String, (String, Relationship)> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([source_id.to_string()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(source_id.to_string(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= options.max_depth {
                continue;
            }

            let edges: Vec<Relationship> = lookups
                .incident(&current)
                .await?
                .iter()
                .filter(|r| options.relationship_types.allows(&r.relationship_type))
                .cloned()
                .collect();

            for relationship in edges {
                let Some(next) = relationship.other_end(&current).map(str::to_string) else {
                    continue;
                };
                if visited.contains(&next) || lookups.live_node(&next).await?.is_none() {
                    continue;
                }
                visited.insert(next.clone());
                parents.insert(next.clone(), (current.clone(), relationship));

                if next == target_id {
                    return Ok(rebuild_path(source_id, target_id, &mut parents));
                }
                queue.push_back((next, depth + 1));
            }
        }

        Ok(Vec::new())
    }

    async fn depth_first(
        &self,
        lookups: &mut Lookups<'_, R>,
        source_id: &str,
        target_id: &str,
        options: &PathOptions,
    ) -> Result<Vec<PathStep>> {
        let mut path = vec![PathStep::start(source_id)];
        let mut on_path: HashSet<String> = HashSet::from([source_id.to_string()]);
        let mut stack = vec![self.ranked_edges(lookups, source_id, options).await?.into_iter()];
        let mut expansions = 0usize;

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let Some(relationship) = frame.next() else {
                stack.pop();
                if let Some(step) = path.pop() {
                    on_path.remove(&step.node_id);
                }
                continue;
            };

            let current = path
                .last()
                .map(|step| step.node_id.clone())
                .unwrap_or_default();
            let Some(next) = relationship.other_end(&current).map(str::to_string) else {
                continue;
            };
            if on_path.contains(&next) || lookups.live_node(&next).await?.is_none() {
                continue;
            }

            expansions += 1;
            if expansions > WEIGHTED_EXPANSION_BUDGET {
                warn!(
                    source = %source_id,
                    target = %target_id,
                    budget = WEIGHTED_EXPANSION_BUDGET,
                    "Weighted path search exhausted its expansion budget, falling back to breadth-first"
                );
                return self.breadth_first(lookups, source_id, target_id, options).await;
            }

            on_path.insert(next.clone());
            path.push(PathStep::via(next.clone(), relationship));
            if next == target_id {
                return Ok(path);
            }

            if path.len() - 1 < options.max_depth {
                stack.push(self.ranked_edges(lookups, &next, options).await?.into_iter());
            } else {
                path.pop();
                on_path.remove(&next);
            }
        }

        Ok(Vec::new())
    }

    /// Traversable edges from `node_id`, heaviest first
    async fn ranked_edges(
        &self,
        lookups: &mut Lookups<'_, R>,
        node_id: &str,
        options: &PathOptions,
    ) -> Result<Vec<Relationship>> {
        let mut edges: Vec<Relationship> = lookups
            .incident(node_id)
            .await?
            .iter()
            .filter(|r| options.relationship_types.allows(&r.relationship_type))
            .cloned()
            .collect();
        edges.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
        Ok(edges)
    }

    // ========== Aggregates ==========

    /// Connectivity statistics over every live node
    pub async fn get_network_metrics(&self) -> Result<NetworkMetrics> {
        let snapshot = GraphSnapshot::load(self.repository.as_ref()).await?;
        let metrics = metrics::compute(&snapshot);
        debug!(
            nodes = metrics.node_count,
            relationships = metrics.edge_count,
            density = metrics.density,
            "Network metrics computed"
        );
        Ok(metrics)
    }

    /// Bounded diameter estimate
    pub async fn diameter(&self, options: DiameterOptions) -> Result<DiameterReport> {
        let snapshot = GraphSnapshot::load(self.repository.as_ref()).await?;
        Ok(diameter::compute(&snapshot, options))
    }

    /// Highest-degree live nodes
    pub async fn popular_nodes(&self, limit: usize) -> Result<Vec<DegreeEntry>> {
        let snapshot = GraphSnapshot::load(self.repository.as_ref()).await?;
        Ok(snapshot
            .ranked_by_degree()
            .into_iter()
            .take(limit)
            .map(|(node, degree)| DegreeEntry {
                node_id: node.id.clone(),
                title: node.title.clone(),
                degree,
            })
            .collect())
    }

    /// Most recently modified live nodes
    pub async fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let query = NodeQuery::default()
            .sorted_by(NodeSortField::ModifiedAt, SortDirection::Desc)
            .paged(Page::new(limit, 0));
        self.repository.list_nodes(&query).await
    }

    // ========== Suggestions ==========

    /// Propose relationships from `node_id` to nodes it is not yet connected to
    pub async fn suggest_relationships(&self, node_id: &str, limit: usize) -> Result<SuggestionOutcome> {
        let source = self
            .repository
            .get_node(node_id)
            .await?
            .filter(|n| !n.is_deleted())
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))?;

        let connected: HashSet<String> = self
            .repository
            .relationships_for_node(node_id)
            .await?
            .iter()
            .filter_map(|r| r.other_end(node_id))
            .map(str::to_string)
            .collect();

        let candidates: Vec<Node> = self
            .repository
            .list_nodes(&NodeQuery::default())
            .await?
            .into_iter()
            .filter(|n| n.id != source.id && !connected.contains(&n.id))
            .collect();

        let mut warnings = Vec::new();
        if source.tags.is_empty() {
            warnings.push(format!(
                "Node '{}' has no tags; suggestions rely on type and author only",
                source.title
            ));
        }
        if candidates.is_empty() {
            warnings.push("No unconnected candidate nodes".to_string());
        }

        let scored = candidates
            .iter()
            .filter_map(|candidate| suggest::score_candidate(&source, candidate))
            .collect();
        let suggestions = suggest::rank(scored, limit);

        debug!(
            node_id = %node_id,
            candidates = candidates.len(),
            suggestions = suggestions.len(),
            "Relationship suggestions computed"
        );

        Ok(SuggestionOutcome {
            source_id: source.id,
            suggestions,
            candidates_considered: candidates.len(),
            warnings,
        })
    }
}

fn rebuild_path(
    source_id: &str,
    target_id: &str,
    parents: &mut HashMap<String, (String, Relationship)>,
) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut current = target_id.to_string();

    while current != source_id {
        let Some((parent, relationship)) = parents.remove(&current) else {
            break;
        };
        steps.push(PathStep::via(current, relationship));
        current = parent;
    }
    steps.push(PathStep::start(source_id));
    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{NodeType, RelationshipType, TypeFilter};
    use crate::infrastructure::memory::InMemoryGraphRepository;
    use std::time::Duration;

    async fn engine_with(
        nodes: &[(&str, &str)],
        edges: &[(&str, &str, f64)],
    ) -> GraphQueryEngine<InMemoryGraphRepository> {
        let repo = InMemoryGraphRepository::new();
        for (id, title) in nodes {
            repo.save_node(&Node::with_id(*id, *title, NodeType::Note))
                .await
                .unwrap();
        }
        for (s, t, w) in edges {
            repo.save_relationship(
                &Relationship::new(*s, *t, RelationshipType::References).with_weight(*w),
            )
            .await
            .unwrap();
        }
        GraphQueryEngine::new(Arc::new(repo))
    }

    async fn chain() -> GraphQueryEngine<InMemoryGraphRepository> {
        engine_with(
            &[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")],
            &[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0)],
        )
        .await
    }

    fn ids(path: &[PathStep]) -> Vec<&str> {
        path.iter().map(|s| s.node_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_two_hop_subgraph() {
        let engine = chain().await;
        let subgraph = engine
            .get_subgraph("a", &SubgraphOptions::new(2, 10))
            .await
            .unwrap();

        assert_eq!(subgraph.node_ids(), vec!["a", "b", "c"]);
        assert!(!subgraph.contains("d"));
        assert_eq!(subgraph.relationships.len(), 2);
        assert!(!subgraph.truncated);

        let b = &subgraph.nodes[1];
        assert_eq!(b.depth, 1);
        assert_eq!(b.degree, 2);
        assert_eq!(b.size, 14);
    }

    #[tokio::test]
    async fn test_subgraph_follows_incoming_edges() {
        let engine = chain().await;
        let subgraph = engine
            .get_subgraph("c", &SubgraphOptions::new(1, 10))
            .await
            .unwrap();
        assert_eq!(subgraph.node_ids(), vec!["c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_subgraph_missing_seed_is_empty() {
        let engine = chain().await;
        let subgraph = engine
            .get_subgraph("zzz", &SubgraphOptions::default())
            .await
            .unwrap();
        assert!(subgraph.is_empty());
        assert!(subgraph.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_subgraph_truncation_drops_dangling_edges() {
        let engine = engine_with(
            &[("hub", "Hub"), ("x", "X"), ("y", "Y"), ("z", "Z")],
            &[("hub", "x", 1.0), ("hub", "y", 1.0), ("hub", "z", 1.0), ("x", "z", 1.0)],
        )
        .await;

        let subgraph = engine
            .get_subgraph("hub", &SubgraphOptions::new(2, 3))
            .await
            .unwrap();
        assert_eq!(subgraph.node_ids(), vec!["hub", "x", "y"]);
        assert!(subgraph.truncated);
        assert_eq!(subgraph.relationships.len(), 2);
        assert!(
            subgraph
                .relationships
                .iter()
                .all(|r| subgraph.contains(&r.source_id) && subgraph.contains(&r.target_id))
        );
    }

    #[tokio::test]
    async fn test_subgraph_exact_fit_is_not_truncated() {
        let engine = chain().await;
        let subgraph = engine
            .get_subgraph("a", &SubgraphOptions::new(5, 4))
            .await
            .unwrap();
        assert_eq!(subgraph.node_ids(), vec!["a", "b", "c", "d"]);
        assert!(!subgraph.truncated);

        let subgraph = engine
            .get_subgraph("a", &SubgraphOptions::new(5, 3))
            .await
            .unwrap();
        assert_eq!(subgraph.node_ids(), vec!["a", "b", "c"]);
        assert!(subgraph.truncated);
    }

    #[tokio::test]
    async fn test_subgraph_weight_floor_and_type_filters() {
        let repo = InMemoryGraphRepository::new();
        repo.save_node(&Node::with_id("a", "A", NodeType::Note)).await.unwrap();
        repo.save_node(&Node::with_id("b", "B", NodeType::Note)).await.unwrap();
        repo.save_node(&Node::with_id("f", "F", NodeType::Folder)).await.unwrap();
        repo.save_node(&Node::with_id("l", "L", NodeType::Note)).await.unwrap();
        repo.save_relationship(&Relationship::new("a", "b", RelationshipType::Uses))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("a", "f", RelationshipType::PartOf))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("a", "l", RelationshipType::Uses).with_weight(0.1))
            .await
            .unwrap();
        let engine = GraphQueryEngine::new(Arc::new(repo));

        let options = SubgraphOptions::new(1, 10)
            .with_weight_floor(0.5)
            .with_node_types(TypeFilter::exclude([NodeType::Folder]));
        let subgraph = engine.get_subgraph("a", &options).await.unwrap();
        assert_eq!(subgraph.node_ids(), vec!["a", "b"]);

        let options = SubgraphOptions::new(1, 10)
            .with_relationship_types(TypeFilter::include([RelationshipType::PartOf]));
        let subgraph = engine.get_subgraph("a", &options).await.unwrap();
        assert_eq!(subgraph.node_ids(), vec!["a", "f"]);
    }

    #[tokio::test]
    async fn test_subgraph_depth_bound_holds() {
        let engine = chain().await;
        for depth in 0..4 {
            let subgraph = engine
                .get_subgraph("a", &SubgraphOptions::new(depth, 100))
                .await
                .unwrap();
            assert_eq!(subgraph.nodes.len(), depth + 1);
            assert!(subgraph.nodes.iter().all(|n| n.depth <= depth));
        }
    }

    #[tokio::test]
    async fn test_subgraph_zero_deadline_returns_seed() {
        let engine = chain().await;
        let subgraph = engine
            .get_subgraph("a", &SubgraphOptions::new(3, 10).with_deadline(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(subgraph.node_ids(), vec!["a"]);
        assert!(subgraph.truncated);
    }

    #[tokio::test]
    async fn test_shortest_path() {
        let engine = chain().await;
        let path = engine
            .find_path("a", "d", &PathOptions::shortest(5))
            .await
            .unwrap();
        assert_eq!(ids(&path), vec!["a", "b", "c", "d"]);
        assert!(path[0].via.is_none());
        assert!(path[1..].iter().all(|s| s.via.is_some()));

        let reversed = engine
            .find_path("d", "a", &PathOptions::shortest(5))
            .await
            .unwrap();
        assert_eq!(ids(&reversed), vec!["d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_path_respects_max_depth() {
        let engine = chain().await;
        let path = engine
            .find_path("a", "d", &PathOptions::shortest(2))
            .await
            .unwrap();
        assert!(path.is_empty());
        assert!(!engine.are_connected("a", "d", 2).await.unwrap());
        assert!(engine.are_connected("a", "d", 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_weighted_path_prefers_heavy_route() {
        let engine = engine_with(
            &[("a", "A"), ("b", "B"), ("c", "C")],
            &[("a", "b", 0.1), ("a", "c", 1.0), ("c", "b", 1.0)],
        )
        .await;

        let weighted = engine
            .find_path("a", "b", &PathOptions::weighted(2))
            .await
            .unwrap();
        assert_eq!(ids(&weighted), vec!["a", "c", "b"]);

        let shortest = engine
            .find_path("a", "b", &PathOptions::shortest(2))
            .await
            .unwrap();
        assert_eq!(ids(&shortest), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_weighted_path_backtracks() {
        let engine = engine_with(
            &[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")],
            &[("a", "c", 5.0), ("c", "d", 5.0), ("a", "b", 0.5)],
        )
        .await;
        let path = engine
            .find_path("a", "b", &PathOptions::weighted(3))
            .await
            .unwrap();
        assert_eq!(ids(&path), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_weighted_path_falls_back_when_budget_runs_out() {
        // A heavy clique hanging off the source soaks up every expansion
        // before the light direct edge to the target is tried
        let clique: Vec<String> = (0..12).map(|i| format!("n{}", i)).collect();
        let mut nodes: Vec<(&str, &str)> = vec![("s", "S"), ("t", "T")];
        nodes.extend(clique.iter().map(|id| (id.as_str(), id.as_str())));
        let mut edges: Vec<(&str, &str, f64)> = vec![("s", "t", 0.01)];
        for (i, a) in clique.iter().enumerate() {
            edges.push(("s", a.as_str(), 1.0));
            for b in &clique[i + 1..] {
                edges.push((a.as_str(), b.as_str(), 1.0));
            }
        }
        let engine = engine_with(&nodes, &edges).await;

        let path = engine
            .find_path("s", "t", &PathOptions::weighted(5))
            .await
            .unwrap();
        assert_eq!(ids(&path), vec!["s", "t"]);
        assert!(engine.are_connected("s", "t", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_path_is_cycle_free() {
        let engine = engine_with(
            &[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")],
            &[("a", "b", 1.0), ("b", "c", 1.0), ("c", "a", 1.0), ("c", "d", 1.0)],
        )
        .await;

        for options in [PathOptions::shortest(4), PathOptions::weighted(4)] {
            let path = engine.find_path("a", "d", &options).await.unwrap();
            let unique: HashSet<&str> = ids(&path).into_iter().collect();
            assert_eq!(unique.len(), path.len());
            assert_eq!(path.last().map(|s| s.node_id.as_str()), Some("d"));
        }
    }

    #[tokio::test]
    async fn test_path_edge_cases() {
        let engine = chain().await;
        let same = engine
            .find_path("b", "b", &PathOptions::default())
            .await
            .unwrap();
        assert_eq!(ids(&same), vec!["b"]);

        let missing = engine
            .find_path("a", "zzz", &PathOptions::default())
            .await
            .unwrap();
        assert!(missing.is_empty());

        let filtered = engine
            .find_path(
                "a",
                "b",
                &PathOptions::shortest(3)
                    .with_relationship_types(TypeFilter::include([RelationshipType::Uses])),
            )
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_network_metrics_density() {
        let engine = chain().await;
        let metrics = engine.get_network_metrics().await.unwrap();
        assert_eq!(metrics.node_count, 4);
        assert_eq!(metrics.edge_count, 3);
        assert_eq!(metrics.density, 0.5);
        assert!(metrics.clustering_is_approximation);
    }

    #[tokio::test]
    async fn test_diameter_and_popular() {
        let engine = chain().await;
        let report = engine.diameter(DiameterOptions::default()).await.unwrap();
        assert_eq!(report.diameter, 3);
        assert!(!report.is_lower_bound);

        let popular = engine.popular_nodes(2).await.unwrap();
        let popular_ids: Vec<&str> = popular.iter().map(|e| e.node_id.as_str()).collect();
        assert_eq!(popular_ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_suggestions_exclude_connected_nodes() {
        let repo = InMemoryGraphRepository::new();
        let tags = ["rust", "graphs", "cache"];
        repo.save_node(&Node::with_id("a", "A", NodeType::Concept).with_tags(tags))
            .await
            .unwrap();
        repo.save_node(&Node::with_id("b", "B", NodeType::Concept).with_tags(tags))
            .await
            .unwrap();
        repo.save_node(&Node::with_id("c", "C", NodeType::Concept).with_tags(["rust"]))
            .await
            .unwrap();
        repo.save_node(&Node::with_id("d", "D", NodeType::Template).with_tags(["cooking"]))
            .await
            .unwrap();
        repo.save_relationship(&Relationship::new("b", "a", RelationshipType::Mentions))
            .await
            .unwrap();
        let engine = GraphQueryEngine::new(Arc::new(repo));

        let outcome = engine.suggest_relationships("a", 10).await.unwrap();
        let targets: Vec<&str> = outcome
            .suggestions
            .iter()
            .map(|s| s.target_id.as_str())
            .collect();
        assert_eq!(targets, vec!["c"]);
        assert_eq!(outcome.candidates_considered, 2);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.suggestions[0].relationship_type, RelationshipType::SimilarTo);
    }

    #[tokio::test]
    async fn test_suggestions_missing_node_errors() {
        let engine = chain().await;
        let err = engine.suggest_relationships("zzz", 5).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_recent_nodes_ordering() {
        let repo = InMemoryGraphRepository::new();
        let mut old = Node::with_id("old", "Old", NodeType::Note);
        old.modified_at = old.modified_at - chrono::Duration::days(1);
        repo.save_node(&old).await.unwrap();
        repo.save_node(&Node::with_id("new", "New", NodeType::Note)).await.unwrap();
        let engine = GraphQueryEngine::new(Arc::new(repo));

        let recent = engine.recent_nodes(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
    }
}
