//! Graph relationships
//!
//! Relationships are directed, typed, weighted edges between two nodes.
//! Weight drives traversal and ranking; strength and confidence are
//! bounded scores carried for consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier for the relationship
    pub id: String,
    /// ID of the source node
    pub source_id: String,
    /// ID of the target node
    pub target_id: String,
    /// Type of relationship
    pub relationship_type: RelationshipType,
    /// Traversal/ranking weight (non-negative, default 1.0)
    pub weight: f64,
    /// Whether consumers should treat the edge as symmetric
    pub bidirectional: bool,
    /// Strength score (0.0 to 1.0)
    pub strength: f64,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    /// Created by an automated process rather than a person
    pub automatic: bool,
    /// Confirmed by a person
    pub verified: bool,
    pub description: Option<String>,
    pub context: Option<String>,
    pub evidence: Option<String>,
    /// Open properties bag
    pub properties: Map<String, Value>,
    /// When the relationship was created
    pub created_at: DateTime<Utc>,
    /// When the relationship was last updated
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    /// Create a new relationship between two nodes
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            weight: 1.0,
            bidirectional: false,
            strength: 1.0,
            confidence: 1.0,
            automatic: false,
            verified: false,
            description: None,
            context: None,
            evidence: None,
            properties: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the weight (negative values clamp to zero)
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    /// Set the strength (clamped to 0.0-1.0)
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Set the confidence (clamped to 0.0-1.0)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Mark as machine-generated
    pub fn automatic(mut self) -> Self {
        self.automatic = true;
        self
    }

    /// Insert a property value
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether this relationship is a self-loop
    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }

    /// Whether the relationship touches the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }

    /// The endpoint opposite to `node_id`, if the relationship touches it
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source_id == node_id {
            Some(&self.target_id)
        } else if self.target_id == node_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    /// Apply optional attributes
    pub fn with_attrs(mut self, attrs: RelationshipAttrs) -> Self {
        self.apply(attrs);
        self
    }

    /// Apply optional attributes in place, bumping `updated_at`
    pub fn apply(&mut self, attrs: RelationshipAttrs) {
        if let Some(weight) = attrs.weight {
            self.weight = weight.max(0.0);
        }
        if let Some(bidirectional) = attrs.bidirectional {
            self.bidirectional = bidirectional;
        }
        if let Some(strength) = attrs.strength {
            self.strength = strength.clamp(0.0, 1.0);
        }
        if let Some(confidence) = attrs.confidence {
            self.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(automatic) = attrs.automatic {
            self.automatic = automatic;
        }
        if let Some(verified) = attrs.verified {
            self.verified = verified;
        }
        if attrs.description.is_some() {
            self.description = attrs.description;
        }
        if attrs.context.is_some() {
            self.context = attrs.context;
        }
        if attrs.evidence.is_some() {
            self.evidence = attrs.evidence;
        }
        if let Some(properties) = attrs.properties {
            self.properties.extend(properties);
        }
        self.updated_at = Utc::now();
    }
}

/// Optional relationship attributes used at creation and for updates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipAttrs {
    pub weight: Option<f64>,
    pub bidirectional: Option<bool>,
    pub strength: Option<f64>,
    pub confidence: Option<f64>,
    pub automatic: Option<bool>,
    pub verified: Option<bool>,
    pub description: Option<String>,
    pub context: Option<String>,
    pub evidence: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

impl RelationshipAttrs {
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    pub fn automatic(mut self, automatic: bool) -> Self {
        self.automatic = Some(automatic);
        self
    }

    pub fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = Some(bidirectional);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Types of relationships between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    References,
    Tags,
    Related,
    Contains,
    DependsOn,
    SimilarTo,
    PartOf,
    Follows,
    Mentions,
    Supersedes,
    Implements,
    Extends,
    Uses,
    ConflictsWith,
}

impl RelationshipType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::References => "REFERENCES",
            Self::Tags => "TAGS",
            Self::Related => "RELATED",
            Self::Contains => "CONTAINS",
            Self::DependsOn => "DEPENDS_ON",
            Self::SimilarTo => "SIMILAR_TO",
            Self::PartOf => "PART_OF",
            Self::Follows => "FOLLOWS",
            Self::Mentions => "MENTIONS",
            Self::Supersedes => "SUPERSEDES",
            Self::Implements => "IMPLEMENTS",
            Self::Extends => "EXTENDS",
            Self::Uses => "USES",
            Self::ConflictsWith => "CONFLICTS_WITH",
        }
    }

    /// Parse from string (case-insensitive, `-` or `_` separators)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "REFERENCES" => Some(Self::References),
            "TAGS" => Some(Self::Tags),
            "RELATED" | "RELATED_TO" => Some(Self::Related),
            "CONTAINS" => Some(Self::Contains),
            "DEPENDS_ON" | "DEPENDSON" => Some(Self::DependsOn),
            "SIMILAR_TO" | "SIMILARTO" => Some(Self::SimilarTo),
            "PART_OF" | "PARTOF" => Some(Self::PartOf),
            "FOLLOWS" => Some(Self::Follows),
            "MENTIONS" => Some(Self::Mentions),
            "SUPERSEDES" => Some(Self::Supersedes),
            "IMPLEMENTS" => Some(Self::Implements),
            "EXTENDS" => Some(Self::Extends),
            "USES" => Some(Self::Uses),
            "CONFLICTS_WITH" | "CONFLICTSWITH" => Some(Self::ConflictsWith),
            _ => None,
        }
    }

    /// Get all relationship types
    pub fn all() -> &'static [RelationshipType] {
        &[
            Self::References,
            Self::Tags,
            Self::Related,
            Self::Contains,
            Self::DependsOn,
            Self::SimilarTo,
            Self::PartOf,
            Self::Follows,
            Self::Mentions,
            Self::Supersedes,
            Self::Implements,
            Self::Extends,
            Self::Uses,
            Self::ConflictsWith,
        ]
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
