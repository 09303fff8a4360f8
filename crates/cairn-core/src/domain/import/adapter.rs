//! Import adapter contract and registry

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::graph::Node;
use crate::error::{Error, Result};

use super::obsidian::ObsidianAdapter;
use super::types::{ImportAnalysis, ImportOptions, ParsedSource, RelationshipMap};

/// One source format's import stages
///
/// Stages run in order: `detect`, then `parse`, `transform` and
/// `map_relationships`. `analyze` is a dry run and never mutates anything.
#[async_trait]
pub trait ImportAdapter: Send + Sync {
    /// Stable identifier used for registry lookup
    fn source_type(&self) -> &'static str;

    // ========== Stages ==========

    /// Cheap structural check that the source is in this adapter's format
    async fn detect(&self, source: &Path) -> Result<bool>;

    /// Counts, warnings, previews and a duration estimate, without importing
    async fn analyze(&self, source: &Path) -> Result<ImportAnalysis>;

    /// Read raw records without transforming them
    async fn parse(&self, source: &Path) -> Result<ParsedSource>;

    /// Produce exactly one node per raw document
    async fn transform(&self, parsed: &ParsedSource, options: &ImportOptions) -> Result<Vec<Node>>;

    /// Resolve links between transformed nodes and add structural anchors
    async fn map_relationships(&self, nodes: &[Node]) -> Result<RelationshipMap>;
}

/// Registry of import adapters keyed by source type
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn ImportAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in adapters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ObsidianAdapter::new()));
        registry
    }

    /// Register an adapter, replacing any with the same source type
    pub fn register(&mut self, adapter: Arc<dyn ImportAdapter>) -> Option<Arc<dyn ImportAdapter>> {
        let source_type = adapter.source_type().to_string();
        debug!(source_type = %source_type, "Registering import adapter");
        self.adapters.insert(source_type, adapter)
    }

    /// Get an adapter by source type
    pub fn get(&self, source_type: &str) -> Option<Arc<dyn ImportAdapter>> {
        self.adapters.get(source_type).cloned()
    }

    /// Get an adapter by source type, failing if none is registered
    pub fn require(&self, source_type: &str) -> Result<Arc<dyn ImportAdapter>> {
        self.get(source_type)
            .ok_or_else(|| Error::AdapterNotFound(source_type.to_string()))
    }

    /// Registered source types, sorted
    pub fn source_types(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// First adapter, in source-type order, whose `detect` accepts the source
    pub async fn detect(&self, source: &Path) -> Result<Option<Arc<dyn ImportAdapter>>> {
        for adapter in self.adapters.values() {
            if adapter.detect(source).await? {
                debug!(source_type = adapter.source_type(), path = %source.display(), "Source detected");
                return Ok(Some(Arc::clone(adapter)));
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("source_types", &self.source_types())
            .finish()
    }
}
