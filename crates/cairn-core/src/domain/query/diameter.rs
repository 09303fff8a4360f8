//! Bounded eccentricity search
//!
//! Runs a breadth-first search from every live node, ignoring direction.
//! Unreachable pairs are excluded, so a disconnected graph only yields a
//! lower bound. The report says so through `is_lower_bound` and
//! `components`.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::snapshot::GraphSnapshot;

/// Bounds for [`GraphQueryEngine::diameter`](super::GraphQueryEngine::diameter)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiameterOptions {
    /// Stop each search after this many hops
    pub max_depth: Option<usize>,
    /// Stop examining new sources after this long
    pub deadline: Option<Duration>,
}

/// Diameter estimate with its caveats spelled out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiameterReport {
    /// Maximum finite eccentricity observed
    pub diameter: usize,
    pub node_count: usize,
    /// Sources whose search completed
    pub sources_examined: usize,
    /// Connected components, ignoring edge direction
    pub components: usize,
    /// The true diameter may be larger (disconnected, or a bound cut the search short)
    pub is_lower_bound: bool,
}

/// Eccentricity of `source`, and whether the depth bound cut the search short
fn eccentricity(snapshot: &GraphSnapshot, source: &str, max_depth: Option<usize>) -> (usize, bool) {
    let mut seen: HashSet<&str> = HashSet::from([source]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(source, 0)]);
    let mut furthest = 0;
    let mut cut = false;

    while let Some((current, depth)) = queue.pop_front() {
        furthest = furthest.max(depth);
        for neighbor in snapshot.neighbors(current) {
            if seen.contains(neighbor) {
                continue;
            }
            if max_depth.is_some_and(|limit| depth >= limit) {
                cut = true;
                continue;
            }
            seen.insert(neighbor);
            queue.push_back((neighbor, depth + 1));
        }
    }

    (furthest, cut)
}

fn count_components(snapshot: &GraphSnapshot) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = 0;

    for id in snapshot.sorted_ids() {
        if !seen.insert(id) {
            continue;
        }
        components += 1;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for neighbor in snapshot.neighbors(current) {
                if seen.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
    }

    components
}

pub(crate) fn compute(snapshot: &GraphSnapshot, options: DiameterOptions) -> DiameterReport {
    let started = Instant::now();
    let ids = snapshot.sorted_ids();
    let components = count_components(snapshot);

    let mut diameter = 0;
    let mut sources_examined = 0;
    let mut cut_short = false;

    for id in &ids {
        if options.deadline.is_some_and(|budget| started.elapsed() >= budget) {
            cut_short = true;
            break;
        }
        let (ecc, cut) = eccentricity(snapshot, id, options.max_depth);
        diameter = diameter.max(ecc);
        cut_short |= cut;
        sources_examined += 1;
    }

    DiameterReport {
        diameter,
        node_count: ids.len(),
        sources_examined,
        components,
        is_lower_bound: components > 1 || cut_short,
    }
}
