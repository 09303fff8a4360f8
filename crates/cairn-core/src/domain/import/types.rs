//! Import records, options and reports

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::graph::{Node, Relationship};

/// Fixed per-item costs of the duration estimate, in milliseconds
pub const MS_PER_DOCUMENT: u64 = 10;
pub const MS_PER_LINK: u64 = 2;
pub const MS_PER_ATTACHMENT: u64 = 5;

/// Linear processing-time estimate for an import
pub fn estimate_duration_ms(documents: usize, links: usize, attachments: usize) -> u64 {
    documents as u64 * MS_PER_DOCUMENT + links as u64 * MS_PER_LINK + attachments as u64 * MS_PER_ATTACHMENT
}

// ========== Raw Records ==========

/// A `[[target#heading|alias]]` reference found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub target: String,
    pub heading: Option<String>,
    pub alias: Option<String>,
    /// `![[...]]` form
    pub embed: bool,
}

impl RawLink {
    /// Split the inside of a wikilink into target, heading and alias
    pub fn parse(inner: &str, embed: bool) -> Self {
        let (reference, alias) = match inner.split_once('|') {
            Some((reference, alias)) => (reference, non_empty(alias)),
            None => (inner, None),
        };
        let (target, heading) = match reference.split_once('#') {
            Some((target, heading)) => (target, non_empty(heading)),
            None => (reference, None),
        };

        Self {
            target: target.trim().to_string(),
            heading,
            alias,
            embed,
        }
    }

    /// File extension of the target, lowercased, if it has one
    pub fn extension(&self) -> Option<String> {
        let name = self.target.rsplit('/').next().unwrap_or(&self.target);
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && !ext.contains(' '))
    }

    /// Whether the link points at a non-note file
    pub fn is_attachment(&self) -> bool {
        self.extension().is_some_and(|ext| ext != "md")
    }

    /// Links to a heading within the same note have no target
    pub fn is_local(&self) -> bool {
        self.target.is_empty()
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A note file read from the source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Path relative to the source root, `/`-separated, with extension
    pub path: String,
    /// File stem
    pub title: String,
    /// Body with the frontmatter block removed
    pub content: String,
    pub frontmatter: Map<String, Value>,
    pub tags: BTreeSet<String>,
    pub links: Vec<RawLink>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl RawDocument {
    /// Containing folder relative to the root; empty for the root itself
    pub fn folder(&self) -> &str {
        folder_of(&self.path)
    }

    /// Path without the `.md` extension
    pub fn path_stem(&self) -> &str {
        strip_md(&self.path)
    }

    /// Alternative names declared in frontmatter
    pub fn aliases(&self) -> Vec<String> {
        match self.frontmatter.get("aliases").or_else(|| self.frontmatter.get("alias")) {
            Some(Value::String(alias)) => vec![alias.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Aggregated note-to-note link as written in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub source_path: String,
    pub target: String,
    pub occurrences: usize,
}

/// A non-note file in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttachment {
    pub path: String,
    pub extension: String,
    pub size_bytes: u64,
    /// Paths of documents that embed this file
    pub referenced_by: BTreeSet<String>,
}

/// Everything an adapter extracted from a source, before transformation
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub root: PathBuf,
    pub documents: Vec<RawDocument>,
    pub relationships: Vec<RawRelationship>,
    pub attachments: Vec<RawAttachment>,
    /// Problems met while reading (unreadable files, bad frontmatter)
    pub warnings: Vec<ImportWarning>,
}

impl ParsedSource {
    pub fn link_count(&self) -> usize {
        self.documents.iter().map(|d| d.links.len()).sum()
    }
}

pub(crate) fn folder_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
}

pub(crate) fn strip_md(path: &str) -> &str {
    let cut = path.len().saturating_sub(3);
    match path.get(cut..) {
        Some(ext) if cut > 0 && ext.eq_ignore_ascii_case(".md") => &path[..cut],
        _ => path,
    }
}

// ========== Warnings ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
}

impl fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    BrokenLink,
    MissingAttachment,
    EmptyDocument,
    ShortContent,
    InvalidFrontmatter,
    UnreadableFile,
    UnconvertedMarkup,
}

impl WarningKind {
    pub fn severity(&self) -> WarningSeverity {
        match self {
            Self::MissingAttachment | Self::UnreadableFile => WarningSeverity::High,
            Self::BrokenLink | Self::InvalidFrontmatter => WarningSeverity::Medium,
            Self::EmptyDocument | Self::ShortContent | Self::UnconvertedMarkup => WarningSeverity::Low,
        }
    }
}

/// Non-fatal problem found during an import; never aborts the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub severity: WarningSeverity,
    /// Document or file the warning is about
    pub path: String,
    pub message: String,
}

impl ImportWarning {
    pub fn new(kind: WarningKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn broken_link(path: &str, target: &str) -> Self {
        Self::new(
            WarningKind::BrokenLink,
            path,
            format!("link to '{}' does not resolve to any document", target),
        )
    }

    pub fn missing_attachment(path: &str, target: &str) -> Self {
        Self::new(
            WarningKind::MissingAttachment,
            path,
            format!("embedded file '{}' is missing", target),
        )
    }

    pub fn empty_document(path: &str) -> Self {
        Self::new(WarningKind::EmptyDocument, path, "document has no content")
    }
}

// ========== Analysis ==========

/// Before/after sample of the content transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformPreview {
    pub path: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGraphEdge {
    pub source: String,
    pub target: String,
    /// Number of times the source links to the target
    pub weight: usize,
}

/// Document-level link graph, keyed by source path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<LinkGraphEdge>,
}

/// Result of a dry run over a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAnalysis {
    pub source_type: String,
    pub document_count: usize,
    pub link_count: usize,
    pub attachment_count: usize,
    /// Distinct tags across all documents
    pub tag_count: usize,
    /// Documents per folder; the root folder is the empty string
    pub folders: BTreeMap<String, usize>,
    pub link_graph: LinkGraph,
    pub warnings: Vec<ImportWarning>,
    pub previews: Vec<TransformPreview>,
    pub estimated_duration_ms: u64,
}

impl ImportAnalysis {
    pub fn estimated_duration(&self) -> Duration {
        Duration::from_millis(self.estimated_duration_ms)
    }

    pub fn warnings_with(&self, severity: WarningSeverity) -> usize {
        self.warnings.iter().filter(|w| w.severity == severity).count()
    }
}

// ========== Transform / Mapping ==========

/// Import settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Documents transformed at once
    pub concurrency: usize,
    pub convert_wikilinks: bool,
    pub convert_callouts: bool,
    /// Keep the parsed frontmatter in node metadata
    pub preserve_frontmatter: bool,
    /// Content shorter than this (in chars) draws a validation warning
    pub min_content_length: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            convert_wikilinks: true,
            convert_callouts: true,
            preserve_frontmatter: true,
            min_content_length: 50,
        }
    }
}

impl ImportOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Relationships derived from transformed nodes
#[derive(Debug, Clone, Default)]
pub struct RelationshipMap {
    /// Link and folder-membership relationships
    pub relationships: Vec<Relationship>,
    /// Synthesized folder nodes the membership relationships point at
    pub folder_nodes: Vec<Node>,
    /// Link targets that matched no node
    pub unresolved_links: usize,
    /// Links from a node to itself, skipped
    pub self_links: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_link_parse() {
        let link = RawLink::parse("Some Note#Intro|the intro", false);
        assert_eq!(link.target, "Some Note");
        assert_eq!(link.heading.as_deref(), Some("Intro"));
        assert_eq!(link.alias.as_deref(), Some("the intro"));

        let local = RawLink::parse("#Heading", false);
        assert!(local.is_local());

        let image = RawLink::parse("assets/diagram.PNG", true);
        assert_eq!(image.extension().as_deref(), Some("png"));
        assert!(image.is_attachment());
        assert!(!RawLink::parse("notes/v1.2 draft", false).is_attachment());
        assert!(!RawLink::parse("Other.md", false).is_attachment());
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(folder_of("a/b/c.md"), "a/b");
        assert_eq!(folder_of("c.md"), "");
        assert_eq!(strip_md("a/b/C.MD"), "a/b/C");
        assert_eq!(strip_md("image.png"), "image.png");
    }

    #[test]
    fn test_duration_estimate() {
        assert_eq!(estimate_duration_ms(3, 4, 2), 30 + 8 + 10);
    }

    #[test]
    fn test_warning_severity() {
        assert_eq!(ImportWarning::broken_link("a.md", "b").severity, WarningSeverity::Medium);
        assert_eq!(ImportWarning::missing_attachment("a.md", "x.png").severity, WarningSeverity::High);
        assert_eq!(ImportWarning::empty_document("a.md").severity, WarningSeverity::Low);
        assert!(WarningSeverity::High > WarningSeverity::Low);
    }
}
