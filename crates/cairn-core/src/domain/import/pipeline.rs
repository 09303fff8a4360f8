//! Import orchestration
//!
//! Runs one adapter over one source and commits the result to a graph
//! store. Per-document problems become failures or warnings in the report;
//! only adapter resolution, detection and whole-source read errors abort.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::graph::{GraphRepository, GraphStore, Node, Relationship};
use crate::error::{Error, Result};

use super::adapter::{AdapterRegistry, ImportAdapter};
use super::types::{ImportAnalysis, ImportOptions, ImportWarning};
use super::validate::{ValidationReport, validate};

/// Where in the run a per-item failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Validate,
    CommitNode,
    CommitFolder,
    CommitRelationship,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::CommitNode => write!(f, "commit_node"),
            Self::CommitFolder => write!(f, "commit_folder"),
            Self::CommitRelationship => write!(f, "commit_relationship"),
        }
    }
}

/// A document or record that could not be imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Source path, node id or relationship endpoints
    pub item: String,
    pub stage: ImportStage,
    pub error: String,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub source_type: String,
    pub source: String,
    pub documents: usize,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub folders_committed: usize,
    pub relationships_created: usize,
    /// Triples that already existed in the store
    pub relationships_skipped: usize,
    pub unresolved_links: usize,
    pub failures: Vec<ImportFailure>,
    pub warnings: Vec<ImportWarning>,
    pub validation: ValidationReport,
    pub duration_ms: u64,
}

impl ImportReport {
    /// Documents committed as nodes
    pub fn succeeded(&self) -> usize {
        self.nodes_created + self.nodes_updated
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.warnings.is_empty()
    }
}

/// Runs adapters against sources and commits to a store
pub struct ImportPipeline<R: GraphRepository> {
    store: Arc<GraphStore<R>>,
    registry: AdapterRegistry,
    options: ImportOptions,
}

impl<R: GraphRepository> ImportPipeline<R> {
    pub fn new(store: Arc<GraphStore<R>>, registry: AdapterRegistry) -> Self {
        Self {
            store,
            registry,
            options: ImportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<GraphStore<R>> {
        &self.store
    }

    /// Pick the adapter and confirm it accepts the source
    ///
    /// With no explicit source type every registered adapter is tried.
    async fn resolve_adapter(
        &self,
        source: &Path,
        source_type: Option<&str>,
    ) -> Result<Arc<dyn ImportAdapter>> {
        let not_detected = |source_type: &str| Error::SourceNotDetected {
            path: source.display().to_string(),
            source_type: source_type.to_string(),
        };

        match source_type {
            Some(source_type) => {
                let adapter = self.registry.require(source_type)?;
                if !adapter.detect(source).await? {
                    return Err(not_detected(source_type));
                }
                Ok(adapter)
            }
            None => self
                .registry
                .detect(source)
                .await?
                .ok_or_else(|| not_detected("supported")),
        }
    }

    /// Dry run: analyze a source without touching the store
    pub async fn analyze(&self, source: &Path, source_type: Option<&str>) -> Result<ImportAnalysis> {
        let adapter = self.resolve_adapter(source, source_type).await?;
        adapter.analyze(source).await
    }

    /// Import a source into the store
    pub async fn import(&self, source: &Path, source_type: Option<&str>) -> Result<ImportReport> {
        let started = Instant::now();

        // Step 1: Resolve and detect; nothing is parsed for a rejected source
        let adapter = self.resolve_adapter(source, source_type).await?;
        let mut report = ImportReport {
            source_type: adapter.source_type().to_string(),
            source: source.display().to_string(),
            ..Default::default()
        };

        // Step 2: Parse and transform
        let parsed = adapter.parse(source).await?;
        report.documents = parsed.documents.len();
        report.warnings.extend(parsed.warnings.iter().cloned());
        let nodes = adapter.transform(&parsed, &self.options).await?;

        // Step 3: Validate; blocked nodes never reach the store
        let validation = validate(&nodes, self.options.min_content_length);
        let blocked: BTreeSet<String> = validation
            .blocked_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        for result in validation.results.iter().filter(|r| r.is_blocked()) {
            report.failures.push(ImportFailure {
                item: source_path_or_id(&nodes, &result.node_id),
                stage: ImportStage::Validate,
                error: result.errors.join("; "),
            });
        }
        report.warnings.extend(validation.warnings().cloned());
        report.validation = validation;

        // Step 4: Commit document nodes
        let mut committed = Vec::with_capacity(nodes.len());
        for node in nodes.into_iter().filter(|n| !blocked.contains(&n.id)) {
            let item = node.metadata_str("source_path").unwrap_or(&node.id).to_string();
            match self.commit_node(node).await {
                Ok((node, created)) => {
                    if created {
                        report.nodes_created += 1;
                    } else {
                        report.nodes_updated += 1;
                    }
                    committed.push(node);
                }
                Err(e) => {
                    warn!(item = %item, error = %e, "Failed to commit node");
                    report.failures.push(ImportFailure {
                        item,
                        stage: ImportStage::CommitNode,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Step 5: Map relationships between committed nodes only
        let map = adapter.map_relationships(&committed).await?;
        report.unresolved_links = map.unresolved_links;

        for folder in map.folder_nodes {
            let item = folder.title.clone();
            match self.commit_node(folder).await {
                Ok(_) => report.folders_committed += 1,
                Err(e) => {
                    warn!(folder = %item, error = %e, "Failed to commit folder node");
                    report.failures.push(ImportFailure {
                        item,
                        stage: ImportStage::CommitFolder,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Step 6: Commit relationships, skipping triples already present
        for relationship in map.relationships {
            let existing = self
                .store
                .repository()
                .get_relationship_between(
                    &relationship.source_id,
                    &relationship.target_id,
                    relationship.relationship_type,
                )
                .await;
            match existing {
                Ok(Some(_)) => {
                    report.relationships_skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failures.push(relationship_failure(&relationship, &e));
                    continue;
                }
            }

            if let Err(e) = self.store.add_relationship(relationship.clone()).await {
                warn!(
                    source = %relationship.source_id,
                    target = %relationship.target_id,
                    error = %e,
                    "Failed to commit relationship"
                );
                report.failures.push(relationship_failure(&relationship, &e));
            } else {
                report.relationships_created += 1;
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            source = %report.source,
            source_type = %report.source_type,
            documents = report.documents,
            created = report.nodes_created,
            updated = report.nodes_updated,
            relationships = report.relationships_created,
            failures = report.failures.len(),
            warnings = report.warnings.len(),
            duration_ms = report.duration_ms,
            "Import complete"
        );
        Ok(report)
    }

    /// Upsert a node, reporting whether it was new
    async fn commit_node(&self, node: Node) -> Result<(Node, bool)> {
        let created = self.store.get_node(&node.id).await?.is_none();
        let node = self.store.upsert_node(node).await?;
        debug!(node_id = %node.id, created, "Imported node committed");
        Ok((node, created))
    }
}

fn source_path_or_id(nodes: &[Node], node_id: &str) -> String {
    nodes
        .iter()
        .find(|n| n.id == node_id)
        .and_then(|n| n.metadata_str("source_path"))
        .unwrap_or(node_id)
        .to_string()
}

fn relationship_failure(relationship: &Relationship, error: &Error) -> ImportFailure {
    ImportFailure {
        item: format!(
            "{} -[{}]-> {}",
            relationship.source_id, relationship.relationship_type, relationship.target_id
        ),
        stage: ImportStage::CommitRelationship,
        error: error.to_string(),
    }
}
