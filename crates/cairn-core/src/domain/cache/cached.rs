//! Cached read paths over the query engine
//!
//! Each read goes through [`QueryCache::get_or_set`]. Invalidation is
//! advisory: graph events drop the keys most likely to be stale, and
//! anything else ages out with its TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::graph::{GraphEvent, GraphRepository, Node};
use crate::domain::query::{
    DegreeEntry, GraphQueryEngine, NetworkMetrics, PathOptions, PathStep, Subgraph, SubgraphOptions,
};
use crate::error::Result;

use super::key::{self, AGGREGATE_PREFIXES};
use super::store::QueryCache;
use super::task::InvalidatorHandle;

/// Query engine reads memoized in a [`QueryCache`]
pub struct CachedGraphQueries<R: GraphRepository> {
    engine: GraphQueryEngine<R>,
    cache: QueryCache,
    ttl: Option<Duration>,
}

impl<R: GraphRepository> Clone for CachedGraphQueries<R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }
}

impl<R: GraphRepository> CachedGraphQueries<R> {
    pub fn new(repository: Arc<R>, cache: QueryCache) -> Self {
        Self {
            engine: GraphQueryEngine::new(repository),
            cache,
            ttl: None,
        }
    }

    /// Override the cache's default TTL for these reads
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn engine(&self) -> &GraphQueryEngine<R> {
        &self.engine
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn subgraph(&self, node_id: &str, options: &SubgraphOptions) -> Result<Subgraph> {
        let key = key::subgraph_key(node_id, options);
        self.cache
            .get_or_set(&key, self.ttl, || self.engine.get_subgraph(node_id, options))
            .await
    }

    pub async fn network_metrics(&self) -> Result<NetworkMetrics> {
        self.cache
            .get_or_set(&key::metrics_key(), self.ttl, || self.engine.get_network_metrics())
            .await
    }

    pub async fn find_path(&self, source_id: &str, target_id: &str, options: &PathOptions) -> Result<Vec<PathStep>> {
        let key = key::path_key(source_id, target_id, options);
        self.cache
            .get_or_set(&key, self.ttl, || {
                self.engine.find_path(source_id, target_id, options)
            })
            .await
    }

    /// Highest-degree nodes
    pub async fn popular_nodes(&self, limit: usize) -> Result<Vec<DegreeEntry>> {
        self.cache
            .get_or_set(&key::popular_key(limit), self.ttl, || self.engine.popular_nodes(limit))
            .await
    }

    /// Most recently modified nodes
    pub async fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        self.cache
            .get_or_set(&key::recent_key(limit), self.ttl, || self.engine.recent_nodes(limit))
            .await
    }

    /// Drop cached values an event is likely to have made stale
    pub async fn invalidate_for(&self, event: &GraphEvent) -> usize {
        invalidate(&self.cache, event).await
    }

    /// Spawn a task that invalidates on every graph event until cancelled
    pub fn spawn_invalidator(&self, events: broadcast::Receiver<GraphEvent>) -> InvalidatorHandle {
        spawn_invalidator(self.cache.clone(), events)
    }
}

async fn invalidate(cache: &QueryCache, event: &GraphEvent) -> usize {
    let mut removed = 0;
    for prefix in AGGREGATE_PREFIXES {
        removed += cache.delete_prefix(prefix).await;
    }
    for node_id in event.affected_nodes() {
        removed += cache.delete_prefix(&key::subgraph_prefix(node_id)).await;
    }
    debug!(event = event.event_type_name(), removed = removed, "Cache invalidated");
    removed
}

/// Subscribe a cache to graph events
pub fn spawn_invalidator(cache: QueryCache, mut events: broadcast::Receiver<GraphEvent>) -> InvalidatorHandle {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel_clone.cancelled() => break,
                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            invalidate(&cache, &event).await;
                        }
                        Err(RecvError::Lagged(n)) => {
                            // Missed events could touch anything
                            warn!(missed = n, "Cache invalidator lagged, clearing cache");
                            cache.clear().await;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    InvalidatorHandle::new(cancel, join)
}
