//! Cache warm-up
//!
//! Pre-populates aggregate statistics, the popular and recent node lists,
//! and a subgraph for each listed node. Warm-up is best-effort: a failing
//! key is logged and recorded, and the batch continues.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::graph::GraphRepository;
use crate::domain::query::SubgraphOptions;

use super::cached::CachedGraphQueries;
use super::key;
use super::task::TaskHandle;

/// What to pre-populate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupPlan {
    pub popular_limit: usize,
    pub recent_limit: usize,
    /// Depth of the subgraph cached for each listed node
    pub subgraph_depth: usize,
    /// Node cap for each cached subgraph
    pub subgraph_max_nodes: usize,
}

impl Default for WarmupPlan {
    fn default() -> Self {
        Self {
            popular_limit: 10,
            recent_limit: 10,
            subgraph_depth: 2,
            subgraph_max_nodes: 100,
        }
    }
}

impl WarmupPlan {
    pub(crate) fn subgraph_options(&self) -> SubgraphOptions {
        SubgraphOptions::new(self.subgraph_depth, self.subgraph_max_nodes)
    }
}

/// A key that could not be warmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one warm-up run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmupReport {
    pub warmed: Vec<String>,
    pub failures: Vec<WarmupFailure>,
    /// The run stopped early because it was cancelled
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Handle for a one-shot background warm-up
pub type WarmupHandle = TaskHandle<WarmupReport>;

/// Handle for repeated warm-ups; resolves to the number of completed runs
pub type WarmupScheduleHandle = TaskHandle<usize>;

/// Drives warm-up runs against a set of cached queries
pub struct CacheWarmer<R: GraphRepository> {
    queries: CachedGraphQueries<R>,
}

impl<R: GraphRepository> Clone for CacheWarmer<R> {
    fn clone(&self) -> Self {
        Self {
            queries: self.queries.clone(),
        }
    }
}

impl<R: GraphRepository> CacheWarmer<R> {
    pub fn new(queries: CachedGraphQueries<R>) -> Self {
        Self { queries }
    }

    /// Run one warm-up to completion
    pub async fn warm(&self, plan: &WarmupPlan) -> WarmupReport {
        self.warm_until(plan, &CancellationToken::new()).await
    }

    /// Run one warm-up, checking `cancel` between keys
    pub async fn warm_until(&self, plan: &WarmupPlan, cancel: &CancellationToken) -> WarmupReport {
        let started = Instant::now();
        let mut report = WarmupReport::default();
        let mut listed: BTreeSet<String> = BTreeSet::new();

        // Step 1: Aggregates and node lists
        if cancel.is_cancelled() {
            return finish(report, started, true);
        }
        match self.queries.network_metrics().await {
            Ok(_) => report.warmed.push(key::metrics_key()),
            Err(e) => record_failure(&mut report, key::metrics_key(), e.to_string()),
        }

        if cancel.is_cancelled() {
            return finish(report, started, true);
        }
        match self.queries.popular_nodes(plan.popular_limit).await {
            Ok(popular) => {
                listed.extend(popular.into_iter().map(|entry| entry.node_id));
                report.warmed.push(key::popular_key(plan.popular_limit));
            }
            Err(e) => record_failure(&mut report, key::popular_key(plan.popular_limit), e.to_string()),
        }

        if cancel.is_cancelled() {
            return finish(report, started, true);
        }
        match self.queries.recent_nodes(plan.recent_limit).await {
            Ok(recent) => {
                listed.extend(recent.into_iter().map(|node| node.id));
                report.warmed.push(key::recent_key(plan.recent_limit));
            }
            Err(e) => record_failure(&mut report, key::recent_key(plan.recent_limit), e.to_string()),
        }

        // Step 2: One subgraph per listed node
        let options = plan.subgraph_options();
        for node_id in &listed {
            if cancel.is_cancelled() {
                return finish(report, started, true);
            }
            let subgraph_key = key::subgraph_key(node_id, &options);
            match self.queries.subgraph(node_id, &options).await {
                Ok(_) => report.warmed.push(subgraph_key),
                Err(e) => record_failure(&mut report, subgraph_key, e.to_string()),
            }
        }

        finish(report, started, false)
    }
}

impl<R: GraphRepository + 'static> CacheWarmer<R> {
    /// Run one warm-up in the background
    pub fn spawn(&self, plan: WarmupPlan) -> WarmupHandle {
        let warmer = self.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let join = tokio::spawn(async move { warmer.warm_until(&plan, &cancel_clone).await });
        WarmupHandle::new(cancel, join)
    }

    /// Repeat warm-ups every `interval` until cancelled
    pub fn schedule(&self, plan: WarmupPlan, interval: Duration) -> WarmupScheduleHandle {
        let warmer = self.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let period = interval.max(Duration::from_millis(1));

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut runs = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_clone.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = warmer.warm_until(&plan, &cancel_clone).await;
                        if report.cancelled {
                            break;
                        }
                        runs += 1;
                    }
                }
            }
            runs
        });

        WarmupScheduleHandle::new(cancel, join)
    }
}

fn record_failure(report: &mut WarmupReport, key: String, error: String) {
    warn!(key = %key, error = %error, "Cache warm-up failed for key");
    report.failures.push(WarmupFailure { key, error });
}

fn finish(mut report: WarmupReport, started: Instant, cancelled: bool) -> WarmupReport {
    report.cancelled = cancelled;
    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        warmed = report.warmed.len(),
        failed = report.failures.len(),
        cancelled = cancelled,
        duration_ms = report.duration_ms,
        "Cache warm-up finished"
    );
    report
}
