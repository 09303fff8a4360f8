//! Graph nodes
//!
//! A node is a typed, identified unit of knowledge content. Nodes carry a
//! title, free-text content, a tag set, and an open metadata bag.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for the node
    pub id: String,
    /// Discriminated type tag
    pub node_type: NodeType,
    /// Human-readable title
    pub title: String,
    /// Free-text content
    pub content: String,
    /// Tag set (deduplicated, ordered)
    pub tags: BTreeSet<String>,
    /// Open metadata bag
    pub metadata: Map<String, Value>,
    /// When the node was created
    pub created_at: DateTime<Utc>,
    /// When the node was last modified
    pub modified_at: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a new node with a random id
    pub fn new(title: impl Into<String>, node_type: NodeType) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, node_type)
    }

    /// Create a new node with a caller-chosen id
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, node_type: NodeType) -> Self {
        let now = Utc::now();

        Self {
            id: id.into(),
            node_type,
            title: title.into(),
            content: String::new(),
            tags: BTreeSet::new(),
            metadata: Map::new(),
            created_at: now,
            modified_at: now,
            deleted_at: None,
        }
    }

    /// Set the content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Insert a metadata value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the node has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Author or creator recorded in metadata, if any
    pub fn author(&self) -> Option<&str> {
        self.metadata
            .get("author")
            .or_else(|| self.metadata.get("creator"))
            .and_then(Value::as_str)
    }

    /// String metadata lookup
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Apply a patch, bumping `modified_at`
    pub fn apply(&mut self, patch: NodePatch) -> Vec<String> {
        let mut changes = Vec::new();

        if let Some(title) = patch.title {
            self.title = title;
            changes.push("title".to_string());
        }
        if let Some(content) = patch.content {
            self.content = content;
            changes.push("content".to_string());
        }
        if let Some(node_type) = patch.node_type {
            self.node_type = node_type;
            changes.push("node_type".to_string());
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
            changes.push("tags".to_string());
        }
        if let Some(metadata) = patch.metadata {
            for (key, value) in metadata {
                if value.is_null() {
                    self.metadata.remove(&key);
                } else {
                    self.metadata.insert(key, value);
                }
            }
            changes.push("metadata".to_string());
        }

        self.modified_at = Utc::now();
        changes
    }
}

/// Partial update for a node
///
/// `metadata` is merged key by key; a `null` value removes the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub node_type: Option<NodeType>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<Map<String, Value>>,
}

impl NodePatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Types of nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A full document
    Document,
    /// An abstract concept
    Concept,
    /// A reusable template
    Template,
    /// A free-form note
    Note,
    /// A tag promoted to a node
    Tag,
    /// A binary attachment
    Attachment,
    /// A folder from an imported collection
    Folder,
}

impl NodeType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Concept => "concept",
            Self::Template => "template",
            Self::Note => "note",
            Self::Tag => "tag",
            Self::Attachment => "attachment",
            Self::Folder => "folder",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "document" | "doc" => Some(Self::Document),
            "concept" => Some(Self::Concept),
            "template" => Some(Self::Template),
            "note" => Some(Self::Note),
            "tag" => Some(Self::Tag),
            "attachment" => Some(Self::Attachment),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }

    /// Get all node types
    pub fn all() -> &'static [NodeType] {
        &[
            Self::Document,
            Self::Concept,
            Self::Template,
            Self::Note,
            Self::Tag,
            Self::Attachment,
            Self::Folder,
        ]
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
