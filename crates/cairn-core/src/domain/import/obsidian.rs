//! Obsidian vault adapter
//!
//! A vault is a folder holding a `.obsidian` settings directory. Notes are
//! `.md` files, optionally starting with YAML frontmatter. Every other
//! non-hidden file is an attachment. Hidden entries (`.obsidian`, `.trash`,
//! dotfiles) are never read.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::graph::{Node, NodeType, Relationship, RelationshipType};
use crate::error::{Error, Result};

use super::adapter::ImportAdapter;
use super::markdown::{
    convert_callouts, convert_wikilinks, extract_inline_tags, extract_links, frontmatter_tags,
    parse_frontmatter, split_frontmatter,
};
use super::resolve::{LinkIndex, node_index, node_links};
use super::types::{
    ImportAnalysis, ImportOptions, ImportWarning, LinkGraph, LinkGraphEdge, ParsedSource,
    RawAttachment, RawDocument, RawRelationship, RelationshipMap, TransformPreview, WarningKind,
    estimate_duration_ms, strip_md,
};

pub const OBSIDIAN_SOURCE_TYPE: &str = "obsidian";

/// Context and `kind` property of folder-membership relationships
pub const IN_FOLDER: &str = "in-folder";

const MARKER_DIR: &str = ".obsidian";
const PREVIEW_COUNT: usize = 3;
const PREVIEW_CHARS: usize = 400;

/// Imports an Obsidian vault
#[derive(Debug, Clone, Copy, Default)]
pub struct ObsidianAdapter;

impl ObsidianAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Node id of the document at a vault-relative path
    ///
    /// Ids depend only on the path, so re-importing a vault updates nodes
    /// in place.
    pub fn document_id(path: &str) -> String {
        stable_id("document", path)
    }

    /// Node id of the synthesized node for a vault folder
    pub fn folder_id(folder: &str) -> String {
        stable_id("folder", folder)
    }
}

fn stable_id(kind: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(OBSIDIAN_SOURCE_TYPE.as_bytes());
    hasher.update([0u8]);
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[async_trait]
impl ImportAdapter for ObsidianAdapter {
    fn source_type(&self) -> &'static str {
        OBSIDIAN_SOURCE_TYPE
    }

    async fn detect(&self, source: &Path) -> Result<bool> {
        match tokio::fs::metadata(source.join(MARKER_DIR)).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) => {
                debug!(path = %source.display(), error = %e, "No vault marker");
                Ok(false)
            }
        }
    }

    async fn analyze(&self, source: &Path) -> Result<ImportAnalysis> {
        let parsed = self.parse(source).await?;
        let analysis = analyze_parsed(&parsed);

        info!(
            path = %source.display(),
            documents = analysis.document_count,
            links = analysis.link_count,
            attachments = analysis.attachment_count,
            warnings = analysis.warnings.len(),
            "Vault analyzed"
        );
        Ok(analysis)
    }

    async fn parse(&self, source: &Path) -> Result<ParsedSource> {
        let root = source.to_path_buf();

        // walkdir and file reads block
        let parsed = tokio::task::spawn_blocking(move || scan_vault(&root))
            .await
            .map_err(|e| Error::ImportFailed(format!("Vault scan task failed: {}", e)))??;

        debug!(
            path = %source.display(),
            documents = parsed.documents.len(),
            attachments = parsed.attachments.len(),
            relationships = parsed.relationships.len(),
            "Vault parsed"
        );
        Ok(parsed)
    }

    async fn transform(&self, parsed: &ParsedSource, options: &ImportOptions) -> Result<Vec<Node>> {
        let concurrency = options.concurrency.max(1);
        let options = Arc::new(options.clone());

        // `buffered` keeps document order
        let results = stream::iter(parsed.documents.iter().cloned())
            .map(|document| {
                let options = Arc::clone(&options);
                tokio::task::spawn_blocking(move || transform_document(document, &options))
            })
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut nodes = Vec::with_capacity(results.len());
        for result in results {
            let node =
                result.map_err(|e| Error::ImportFailed(format!("Transform task failed: {}", e)))?;
            nodes.push(node);
        }

        debug!(nodes = nodes.len(), concurrency, "Documents transformed");
        Ok(nodes)
    }

    async fn map_relationships(&self, nodes: &[Node]) -> Result<RelationshipMap> {
        let map = map_links(nodes);
        debug!(
            relationships = map.relationships.len(),
            folders = map.folder_nodes.len(),
            unresolved = map.unresolved_links,
            self_links = map.self_links,
            "Relationships mapped"
        );
        Ok(map)
    }
}

// ========== Parse ==========

fn scan_vault(root: &Path) -> Result<ParsedSource> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(Error::InvalidInput(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut parsed = ParsedSource {
        root: root.to_path_buf(),
        ..Default::default()
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| relative_path(root, p)).unwrap_or_default();
                warn!(path = %path, error = %e, "Skipping unreadable vault entry");
                parsed
                    .warnings
                    .push(ImportWarning::new(WarningKind::UnreadableFile, path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = relative_path(root, entry.path());
        let is_note = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));

        if is_note {
            match read_document(entry.path(), &path) {
                Ok((document, warning)) => {
                    parsed.documents.push(document);
                    parsed.warnings.extend(warning);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable note");
                    parsed
                        .warnings
                        .push(ImportWarning::new(WarningKind::UnreadableFile, path, e.to_string()));
                }
            }
        } else {
            parsed.attachments.push(RawAttachment {
                extension: entry
                    .path()
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .unwrap_or_default(),
                size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
                referenced_by: BTreeSet::new(),
                path,
            });
        }
    }

    link_records(&mut parsed);
    Ok(parsed)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_document(full_path: &Path, path: &str) -> std::io::Result<(RawDocument, Option<ImportWarning>)> {
    let bytes = std::fs::read(full_path)?;
    let text = String::from_utf8_lossy(&bytes);
    let metadata = std::fs::metadata(full_path)?;
    let modified_at: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let created_at: DateTime<Utc> = metadata.created().map(DateTime::from).unwrap_or(modified_at);

    let (yaml, body) = split_frontmatter(&text);
    let mut warning = None;
    let frontmatter = match yaml.map(parse_frontmatter) {
        Some(Ok(map)) => map,
        Some(Err(e)) => {
            warning = Some(ImportWarning::new(
                WarningKind::InvalidFrontmatter,
                path,
                format!("frontmatter is not valid YAML: {}", e),
            ));
            Map::new()
        }
        None => Map::new(),
    };

    let mut tags = frontmatter_tags(&frontmatter);
    tags.extend(extract_inline_tags(body));

    let stem = strip_md(path);
    let title = stem.rsplit('/').next().unwrap_or(stem).to_string();

    let document = RawDocument {
        path: path.to_string(),
        title,
        content: body.to_string(),
        links: extract_links(body),
        frontmatter,
        tags,
        size_bytes: bytes.len() as u64,
        created_at,
        modified_at,
    };
    Ok((document, warning))
}

fn document_index(documents: &[RawDocument]) -> LinkIndex<usize> {
    let mut index = LinkIndex::new();
    for (i, doc) in documents.iter().enumerate() {
        index.insert_path(&doc.path, i);
        index.insert_name(&doc.title, i);
        if let Some(title) = doc.frontmatter.get("title").and_then(Value::as_str) {
            index.insert_name(title, i);
        }
        for alias in doc.aliases() {
            index.insert_name(&alias, i);
        }
    }
    index
}

fn attachment_index(attachments: &[RawAttachment]) -> LinkIndex<usize> {
    let mut index = LinkIndex::new();
    for (i, attachment) in attachments.iter().enumerate() {
        index.insert_path(&attachment.path, i);
        let file_name = attachment.path.rsplit('/').next().unwrap_or(&attachment.path);
        index.insert_name(file_name, i);
    }
    index
}

/// Fill in attachment back-references and aggregated note links
fn link_records(parsed: &mut ParsedSource) {
    let attachments = attachment_index(&parsed.attachments);
    let mut embedded: Vec<(usize, String)> = Vec::new();
    let mut links: BTreeMap<(String, String), (String, usize)> = BTreeMap::new();

    for doc in &parsed.documents {
        for link in &doc.links {
            if link.is_attachment() {
                if let Some(&i) = attachments.resolve(&link.target) {
                    embedded.push((i, doc.path.clone()));
                }
            } else if !link.is_local() {
                links
                    .entry((doc.path.clone(), link.target.to_lowercase()))
                    .or_insert_with(|| (link.target.clone(), 0))
                    .1 += 1;
            }
        }
    }

    for (i, path) in embedded {
        parsed.attachments[i].referenced_by.insert(path);
    }
    parsed.relationships = links
        .into_iter()
        .map(|((source_path, _), (target, occurrences))| RawRelationship {
            source_path,
            target,
            occurrences,
        })
        .collect();
}

// ========== Analyze ==========

fn analyze_parsed(parsed: &ParsedSource) -> ImportAnalysis {
    let documents = document_index(&parsed.documents);
    let attachments = attachment_index(&parsed.attachments);

    let mut warnings = parsed.warnings.clone();
    let mut folders: BTreeMap<String, usize> = BTreeMap::new();
    let mut tags: BTreeSet<&str> = BTreeSet::new();
    let mut edges: BTreeMap<(usize, usize), usize> = BTreeMap::new();

    for (i, doc) in parsed.documents.iter().enumerate() {
        *folders.entry(doc.folder().to_string()).or_insert(0) += 1;
        tags.extend(doc.tags.iter().map(String::as_str));

        if doc.content.trim().is_empty() {
            warnings.push(ImportWarning::empty_document(&doc.path));
        }

        // One warning per distinct bad target per document
        let mut reported: BTreeSet<String> = BTreeSet::new();
        for link in doc.links.iter().filter(|l| !l.is_local()) {
            if link.is_attachment() {
                if attachments.resolve(&link.target).is_none()
                    && reported.insert(link.target.to_lowercase())
                {
                    warnings.push(ImportWarning::missing_attachment(&doc.path, &link.target));
                }
                continue;
            }

            match documents.resolve(&link.target) {
                Some(&j) if j != i => *edges.entry((i, j)).or_insert(0) += 1,
                Some(_) => {}
                None => {
                    if reported.insert(link.target.to_lowercase()) {
                        warnings.push(ImportWarning::broken_link(&doc.path, &link.target));
                    }
                }
            }
        }
    }

    let link_graph = LinkGraph {
        nodes: parsed.documents.iter().map(|d| d.path.clone()).collect(),
        edges: edges
            .into_iter()
            .map(|((s, t), weight)| LinkGraphEdge {
                source: parsed.documents[s].path.clone(),
                target: parsed.documents[t].path.clone(),
                weight,
            })
            .collect(),
    };

    let link_count = parsed.link_count();
    ImportAnalysis {
        source_type: OBSIDIAN_SOURCE_TYPE.to_string(),
        document_count: parsed.documents.len(),
        link_count,
        attachment_count: parsed.attachments.len(),
        tag_count: tags.len(),
        folders,
        link_graph,
        warnings,
        previews: previews(&parsed.documents),
        estimated_duration_ms: estimate_duration_ms(
            parsed.documents.len(),
            link_count,
            parsed.attachments.len(),
        ),
    }
}

/// Documents with vault markup first, then the rest
fn previews(documents: &[RawDocument]) -> Vec<TransformPreview> {
    let options = ImportOptions::default();
    let has_markup = |doc: &&RawDocument| doc.content.contains("[[") || doc.content.contains("[!");

    documents
        .iter()
        .filter(has_markup)
        .chain(documents.iter().filter(|doc| !has_markup(doc)))
        .take(PREVIEW_COUNT)
        .map(|doc| TransformPreview {
            path: doc.path.clone(),
            before: truncate(&doc.content, PREVIEW_CHARS),
            after: truncate(&convert_content(&doc.content, &options), PREVIEW_CHARS),
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ========== Transform ==========

fn convert_content(content: &str, options: &ImportOptions) -> String {
    let mut converted = content.to_string();
    if options.convert_wikilinks {
        converted = convert_wikilinks(&converted);
    }
    if options.convert_callouts {
        converted = convert_callouts(&converted);
    }
    converted
}

fn transform_document(document: RawDocument, options: &ImportOptions) -> Node {
    let title = document
        .frontmatter
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| document.title.clone());
    let node_type = document
        .frontmatter
        .get("type")
        .and_then(Value::as_str)
        .and_then(NodeType::parse)
        .unwrap_or(NodeType::Document);

    // Outgoing note links with repetition counts, keyed case-insensitively
    let mut links: BTreeMap<String, (String, usize)> = BTreeMap::new();
    let mut embeds: BTreeSet<String> = BTreeSet::new();
    for link in &document.links {
        if link.is_attachment() {
            embeds.insert(link.target.clone());
        } else if !link.is_local() {
            links
                .entry(link.target.to_lowercase())
                .or_insert_with(|| (link.target.clone(), 0))
                .1 += 1;
        }
    }
    let links: Vec<Value> = links
        .into_values()
        .map(|(target, count)| json!({ "target": target, "count": count }))
        .collect();

    let mut node = Node::with_id(ObsidianAdapter::document_id(&document.path), title, node_type)
        .with_content(convert_content(&document.content, options))
        .with_tags(document.tags.iter().cloned())
        .with_metadata("source_adapter", OBSIDIAN_SOURCE_TYPE)
        .with_metadata("source_path", document.path.as_str())
        .with_metadata("folder", document.folder())
        .with_metadata("links", Value::Array(links));

    if !embeds.is_empty() {
        node = node.with_metadata("attachments", embeds.into_iter().collect::<Vec<_>>());
    }
    let aliases = document.aliases();
    if !aliases.is_empty() {
        node = node.with_metadata("aliases", aliases);
    }
    if options.preserve_frontmatter && !document.frontmatter.is_empty() {
        node = node.with_metadata("frontmatter", Value::Object(document.frontmatter));
    }

    node.created_at = document.created_at;
    node.modified_at = document.modified_at;
    node
}

// ========== Map Relationships ==========

fn map_links(nodes: &[Node]) -> RelationshipMap {
    let index = node_index(nodes);

    let mut map = RelationshipMap::default();
    let mut pairs: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for node in nodes {
        for (target, count) in node_links(node) {
            match index.resolve(target) {
                Some(&id) if id == node.id => map.self_links += 1,
                Some(&id) => *pairs.entry((node.id.as_str(), id)).or_insert(0) += count,
                None => map.unresolved_links += 1,
            }
        }
    }

    for ((source, target), count) in pairs {
        map.relationships.push(
            Relationship::new(source, target, RelationshipType::References)
                .automatic()
                .with_weight(count as f64)
                .with_property("link_count", count as u64),
        );
    }

    let mut folders: BTreeMap<&str, usize> = BTreeMap::new();
    for node in nodes {
        let folder = node.metadata_str("folder").unwrap_or("");
        *folders.entry(folder).or_insert(0) += 1;

        let mut membership =
            Relationship::new(node.id.as_str(), ObsidianAdapter::folder_id(folder), RelationshipType::PartOf)
                .automatic()
                .with_property("kind", IN_FOLDER);
        membership.context = Some(IN_FOLDER.to_string());
        map.relationships.push(membership);
    }

    map.folder_nodes = folders
        .into_iter()
        .map(|(folder, count)| folder_node(folder, count))
        .collect();
    map
}

fn folder_node(folder: &str, document_count: usize) -> Node {
    let title = if folder.is_empty() { "/" } else { folder };
    Node::with_id(ObsidianAdapter::folder_id(folder), title, NodeType::Folder)
        .with_content(format!("Vault folder holding {} imported documents", document_count))
        .with_metadata("source_adapter", OBSIDIAN_SOURCE_TYPE)
        .with_metadata("folder", folder)
        .with_metadata("document_count", document_count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::types::WarningSeverity;
    use std::fs;
    use tempfile::TempDir;

    const INDEX: &str = "---\ntitle: Home\ntags: [hub]\naliases: [Start]\n---\n\
Welcome. See [[Projects/Alpha]], [[Beta|b]] and again [[Beta]].\n\
This one is gone: [[Missing]].\n\
![[diagram.png]] ![[gone.png]]\n\
> [!note] Remember\n> to write\n";

    const ALPHA: &str = "Alpha project notes, back to [[Index]] and [[Alpha]]. #rust\n";

    fn vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join(".obsidian/app.json"), "{}").unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::write(root.join(".trash/old.md"), "[[Index]]").unwrap();
        fs::create_dir_all(root.join("Projects")).unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("Index.md"), INDEX).unwrap();
        fs::write(root.join("Projects/Alpha.md"), ALPHA).unwrap();
        fs::write(root.join("Beta.md"), "").unwrap();
        fs::write(root.join("assets/diagram.png"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_detect() {
        let adapter = ObsidianAdapter::new();
        let vault = vault();
        assert!(adapter.detect(vault.path()).await.unwrap());

        let plain = TempDir::new().unwrap();
        assert!(!adapter.detect(plain.path()).await.unwrap());

        // A plain file named like the marker does not count
        fs::write(plain.path().join(".obsidian"), "").unwrap();
        assert!(!adapter.detect(plain.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_parse_reads_notes_and_attachments() {
        let vault = vault();
        let parsed = ObsidianAdapter::new().parse(vault.path()).await.unwrap();

        let paths: Vec<&str> = parsed.documents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["Beta.md", "Index.md", "Projects/Alpha.md"]);
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].path, "assets/diagram.png");
        assert_eq!(parsed.attachments[0].extension, "png");
        assert!(parsed.attachments[0].referenced_by.contains("Index.md"));

        let index = &parsed.documents[1];
        assert_eq!(index.title, "Index");
        assert_eq!(index.frontmatter["title"], "Home");
        assert!(index.tags.contains("hub"));
        assert!(!index.content.starts_with("---"));
        assert_eq!(index.aliases(), vec!["Start"]);

        let beta = parsed
            .relationships
            .iter()
            .find(|r| r.source_path == "Index.md" && r.target == "Beta")
            .unwrap();
        assert_eq!(beta.occurrences, 2);
        assert_eq!(parsed.relationships.len(), 5);
        assert!(parsed.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_parse_reports_bad_frontmatter() {
        let vault = vault();
        fs::write(vault.path().join("Broken.md"), "---\ntitle: [oops\n---\nStill imported").unwrap();

        let parsed = ObsidianAdapter::new().parse(vault.path()).await.unwrap();
        assert_eq!(parsed.documents.len(), 4);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::InvalidFrontmatter);
        let broken = parsed.documents.iter().find(|d| d.path == "Broken.md").unwrap();
        assert_eq!(broken.content, "Still imported");
    }

    #[tokio::test]
    async fn test_parse_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = ObsidianAdapter::new().parse(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_analyze_dry_run() {
        let vault = vault();
        let analysis = ObsidianAdapter::new().analyze(vault.path()).await.unwrap();

        assert_eq!(analysis.source_type, "obsidian");
        assert_eq!(analysis.document_count, 3);
        assert_eq!(analysis.attachment_count, 1);
        assert_eq!(analysis.link_count, 8);
        assert_eq!(analysis.tag_count, 2);
        assert_eq!(analysis.folders.get(""), Some(&2));
        assert_eq!(analysis.folders.get("Projects"), Some(&1));
        assert_eq!(analysis.estimated_duration_ms, 3 * 10 + 8 * 2 + 5);

        assert_eq!(analysis.warnings_with(WarningSeverity::High), 1);
        assert_eq!(analysis.warnings_with(WarningSeverity::Medium), 1);
        assert_eq!(analysis.warnings_with(WarningSeverity::Low), 1);
        let broken = analysis
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::BrokenLink)
            .unwrap();
        assert_eq!(broken.path, "Index.md");
        assert!(broken.message.contains("Missing"));

        let edges: Vec<(&str, &str, usize)> = analysis
            .link_graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.weight))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("Index.md", "Beta.md", 2),
                ("Index.md", "Projects/Alpha.md", 1),
                ("Projects/Alpha.md", "Index.md", 1),
            ]
        );

        assert_eq!(analysis.previews.len(), 3);
        assert_eq!(analysis.previews[0].path, "Index.md");
        assert!(analysis.previews[0].before.contains("[[Beta|b]]"));
        assert!(analysis.previews[0].after.contains("[b](Beta.md)"));
        assert!(analysis.previews[0].after.contains("> **Note:** Remember"));
    }

    #[tokio::test]
    async fn test_transform_one_node_per_document() {
        let vault = vault();
        let adapter = ObsidianAdapter::new();
        let parsed = adapter.parse(vault.path()).await.unwrap();

        let nodes = adapter
            .transform(&parsed, &ImportOptions::default().with_concurrency(2))
            .await
            .unwrap();
        assert_eq!(nodes.len(), parsed.documents.len());

        let index = &nodes[1];
        assert_eq!(index.id, ObsidianAdapter::document_id("Index.md"));
        assert_eq!(index.title, "Home");
        assert_eq!(index.node_type, NodeType::Document);
        assert!(!index.content.contains("[["));
        assert!(index.content.contains("> **Note:** Remember"));
        assert_eq!(index.metadata_str("source_adapter"), Some("obsidian"));
        assert_eq!(index.metadata_str("source_path"), Some("Index.md"));
        assert_eq!(index.metadata_str("folder"), Some(""));
        assert!(index.metadata.contains_key("frontmatter"));
        assert_eq!(index.metadata["links"].as_array().unwrap().len(), 3);
        assert_eq!(index.metadata["attachments"], json!(["diagram.png", "gone.png"]));

        let alpha = &nodes[2];
        assert_eq!(alpha.metadata_str("folder"), Some("Projects"));
        assert!(alpha.tags.contains("rust"));

        // Ids are stable and order does not depend on concurrency
        let again = adapter
            .transform(&parsed, &ImportOptions::default().with_concurrency(1))
            .await
            .unwrap();
        let ids = |nodes: &[Node]| nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&nodes), ids(&again));
    }

    #[tokio::test]
    async fn test_transform_respects_options() {
        let vault = vault();
        let adapter = ObsidianAdapter::new();
        let parsed = adapter.parse(vault.path()).await.unwrap();
        let options = ImportOptions {
            convert_wikilinks: false,
            convert_callouts: false,
            preserve_frontmatter: false,
            ..ImportOptions::default()
        };

        let nodes = adapter.transform(&parsed, &options).await.unwrap();
        assert!(nodes[1].content.contains("[[Beta|b]]"));
        assert!(nodes[1].content.contains("> [!note] Remember"));
        assert!(!nodes[1].metadata.contains_key("frontmatter"));
    }

    #[tokio::test]
    async fn test_map_relationships() {
        let vault = vault();
        let adapter = ObsidianAdapter::new();
        let parsed = adapter.parse(vault.path()).await.unwrap();
        let nodes = adapter
            .transform(&parsed, &ImportOptions::default())
            .await
            .unwrap();

        let map = adapter.map_relationships(&nodes).await.unwrap();
        let index = ObsidianAdapter::document_id("Index.md");
        let alpha = ObsidianAdapter::document_id("Projects/Alpha.md");
        let beta = ObsidianAdapter::document_id("Beta.md");

        assert_eq!(map.unresolved_links, 1);
        assert_eq!(map.self_links, 1);

        let references: Vec<&Relationship> = map
            .relationships
            .iter()
            .filter(|r| r.relationship_type == RelationshipType::References)
            .collect();
        assert_eq!(references.len(), 3);
        assert!(references.iter().all(|r| r.automatic && !r.is_self_loop()));
        let to_beta = references
            .iter()
            .find(|r| r.source_id == index && r.target_id == beta)
            .unwrap();
        assert_eq!(to_beta.weight, 2.0);
        assert!(references.iter().any(|r| r.source_id == alpha && r.target_id == index));

        let memberships: Vec<&Relationship> = map
            .relationships
            .iter()
            .filter(|r| r.relationship_type == RelationshipType::PartOf)
            .collect();
        assert_eq!(memberships.len(), nodes.len());
        assert!(memberships.iter().all(|r| r.context.as_deref() == Some(IN_FOLDER)));

        assert_eq!(map.folder_nodes.len(), 2);
        let projects = map
            .folder_nodes
            .iter()
            .find(|n| n.id == ObsidianAdapter::folder_id("Projects"))
            .unwrap();
        assert_eq!(projects.node_type, NodeType::Folder);
        assert_eq!(projects.metadata["document_count"], 1);
    }

    #[tokio::test]
    async fn test_links_resolve_by_title_and_alias() {
        let home = Node::with_id("home", "Home", NodeType::Document)
            .with_metadata("source_path", "Index.md")
            .with_metadata("aliases", vec!["Start"])
            .with_metadata("links", json!([]));
        let other = Node::with_id("other", "Other", NodeType::Document)
            .with_metadata("source_path", "notes/Other.md")
            .with_metadata("folder", "notes")
            .with_metadata(
                "links",
                json!([{"target": "home", "count": 1}, {"target": "START", "count": 2}]),
            );

        let map = ObsidianAdapter::new()
            .map_relationships(&[home, other])
            .await
            .unwrap();
        let link = map
            .relationships
            .iter()
            .find(|r| r.relationship_type == RelationshipType::References)
            .unwrap();
        assert_eq!((link.source_id.as_str(), link.target_id.as_str()), ("other", "home"));
        assert_eq!(link.weight, 3.0);
        assert_eq!(map.unresolved_links, 0);
    }

    #[test]
    fn test_stable_ids() {
        assert_eq!(ObsidianAdapter::document_id("a.md"), ObsidianAdapter::document_id("a.md"));
        assert_ne!(ObsidianAdapter::document_id("a.md"), ObsidianAdapter::document_id("b.md"));
        assert_ne!(ObsidianAdapter::document_id("x"), ObsidianAdapter::folder_id("x"));
        assert_eq!(ObsidianAdapter::document_id("a.md").len(), 32);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo", 2), "hé...");
    }
}
