//! Post-transform validation of imported nodes

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::graph::Node;

use super::markdown::has_wikilink_markup;
use super::resolve::{node_index, node_links};
use super::types::{ImportWarning, WarningKind};

pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Warning,
    /// Blocked from import
    Failed,
}

/// Validation outcome for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeValidation {
    pub node_id: String,
    pub title: String,
    pub status: ValidationStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<ImportWarning>,
}

impl NodeValidation {
    pub fn is_blocked(&self) -> bool {
        self.status == ValidationStatus::Failed
    }
}

/// Per-node results plus pass/warn/fail counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<NodeValidation>,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
}

impl ValidationReport {
    /// Ids of nodes that must not be committed
    pub fn blocked_ids(&self) -> BTreeSet<&str> {
        self.results
            .iter()
            .filter(|r| r.is_blocked())
            .map(|r| r.node_id.as_str())
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ImportWarning> {
        self.results.iter().flat_map(|r| r.warnings.iter())
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Check transformed nodes before they are committed
///
/// Empty title or content is an error. Short content, leftover `[[...]]`
/// markup and links to targets outside `nodes` are warnings.
pub fn validate(nodes: &[Node], min_content_length: usize) -> ValidationReport {
    let index = node_index(nodes);
    let mut report = ValidationReport::default();

    for node in nodes {
        let path = node.metadata_str("source_path").unwrap_or(&node.id);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if node.title.trim().is_empty() {
            errors.push("title is empty".to_string());
        }
        let length = node.content.trim().chars().count();
        if length == 0 {
            errors.push("content is empty".to_string());
        } else if length < min_content_length {
            warnings.push(ImportWarning::new(
                WarningKind::ShortContent,
                path,
                format!("content is {} characters, below the {} minimum", length, min_content_length),
            ));
        }

        if has_wikilink_markup(&node.content) {
            warnings.push(ImportWarning::new(
                WarningKind::UnconvertedMarkup,
                path,
                "content still contains [[...]] links",
            ));
        }

        for (target, _) in node_links(node) {
            if index.resolve(target).is_none() {
                warnings.push(ImportWarning::broken_link(path, target));
            }
        }

        let status = if !errors.is_empty() {
            report.failed += 1;
            ValidationStatus::Failed
        } else if !warnings.is_empty() {
            report.warned += 1;
            ValidationStatus::Warning
        } else {
            report.passed += 1;
            ValidationStatus::Passed
        };

        report.results.push(NodeValidation {
            node_id: node.id.clone(),
            title: node.title.clone(),
            status,
            errors,
            warnings,
        });
    }

    report
}
