//! Filters, sorting and pagination for graph listings
//!
//! All filter fields combine with AND semantics. An empty filter matches
//! everything.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::specification::{AllOf, PredicateSpec, Specification};

use super::node::{Node, NodeType};
use super::relationship::{Relationship, RelationshipType};

/// Inclusive numeric range; open on either side when `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn at_most(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Inclusive time range; open on either side when `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after.is_none_or(|after| at >= after) && self.before.is_none_or(|before| at <= before)
    }
}

/// Include/exclude filter over a discriminated type
///
/// An empty include list admits every type not explicitly excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter<T> {
    #[serde(default = "Vec::new")]
    pub include: Vec<T>,
    #[serde(default = "Vec::new")]
    pub exclude: Vec<T>,
}

impl<T> Default for TypeFilter<T> {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl<T: PartialEq> TypeFilter<T> {
    pub fn include(types: impl IntoIterator<Item = T>) -> Self {
        Self {
            include: types.into_iter().collect(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude(types: impl IntoIterator<Item = T>) -> Self {
        Self {
            include: Vec::new(),
            exclude: types.into_iter().collect(),
        }
    }

    pub fn allows(&self, value: &T) -> bool {
        (self.include.is_empty() || self.include.contains(value)) && !self.exclude.contains(value)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Relationship search predicate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipFilter {
    /// Match on source node
    pub source_id: Option<String>,
    /// Match on target node
    pub target_id: Option<String>,
    /// Match relationships touching this node at either end
    pub node_id: Option<String>,
    /// Allowed relationship types (empty means any)
    #[serde(default)]
    pub types: Vec<RelationshipType>,
    pub weight: Option<ValueRange>,
    pub strength: Option<ValueRange>,
    pub confidence: Option<ValueRange>,
    pub verified: Option<bool>,
    pub automatic: Option<bool>,
    pub created: Option<TimeRange>,
}

impl RelationshipFilter {
    pub fn from_source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Default::default()
        }
    }

    pub fn to_target(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Default::default()
        }
    }

    pub fn touching(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            ..Default::default()
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_weight(mut self, range: ValueRange) -> Self {
        self.weight = Some(range);
        self
    }

    pub fn with_confidence(mut self, range: ValueRange) -> Self {
        self.confidence = Some(range);
        self
    }

    pub fn with_strength(mut self, range: ValueRange) -> Self {
        self.strength = Some(range);
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

    pub fn created_within(mut self, range: TimeRange) -> Self {
        self.created = Some(range);
        self
    }

    /// Build the conjunction of every populated field
    pub fn to_spec(&self) -> AllOf<Relationship> {
        let mut spec = AllOf::new();

        if let Some(source_id) = self.source_id.clone() {
            spec.push(PredicateSpec::new(move |r: &Relationship| r.source_id == source_id));
        }
        if let Some(target_id) = self.target_id.clone() {
            spec.push(PredicateSpec::new(move |r: &Relationship| r.target_id == target_id));
        }
        if let Some(node_id) = self.node_id.clone() {
            spec.push(PredicateSpec::new(move |r: &Relationship| r.touches(&node_id)));
        }
        if !self.types.is_empty() {
            let types = self.types.clone();
            spec.push(PredicateSpec::new(move |r: &Relationship| {
                types.contains(&r.relationship_type)
            }));
        }
        if let Some(range) = self.weight {
            spec.push(PredicateSpec::new(move |r: &Relationship| range.contains(r.weight)));
        }
        if let Some(range) = self.strength {
            spec.push(PredicateSpec::new(move |r: &Relationship| range.contains(r.strength)));
        }
        if let Some(range) = self.confidence {
            spec.push(PredicateSpec::new(move |r: &Relationship| range.contains(r.confidence)));
        }
        if let Some(verified) = self.verified {
            spec.push(PredicateSpec::new(move |r: &Relationship| r.verified == verified));
        }
        if let Some(automatic) = self.automatic {
            spec.push(PredicateSpec::new(move |r: &Relationship| r.automatic == automatic));
        }
        if let Some(range) = self.created {
            spec.push(PredicateSpec::new(move |r: &Relationship| range.contains(r.created_at)));
        }

        spec
    }

    /// Evaluate the filter against a single relationship
    pub fn matches(&self, relationship: &Relationship) -> bool {
        self.to_spec().is_satisfied_by(relationship)
    }
}

/// Sort direction for list queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Limit/offset pagination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Apply the page window to an already sorted list
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Sortable node fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSortField {
    #[default]
    CreatedAt,
    ModifiedAt,
    Title,
}

impl NodeSortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::ModifiedAt => "modified_at",
            Self::Title => "title",
        }
    }
}

/// Sortable relationship fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Weight,
    Strength,
    Confidence,
}

impl RelationshipSortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Weight => "weight",
            Self::Strength => "strength",
            Self::Confidence => "confidence",
        }
    }
}

/// Node listing query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeQuery {
    /// Allowed node types (empty means any)
    #[serde(default)]
    pub node_types: Vec<NodeType>,
    /// Require this tag
    pub tag: Option<String>,
    /// Include soft-deleted nodes
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub sort_by: NodeSortField,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub page: Page,
}

impl NodeQuery {
    pub fn of_type(node_type: NodeType) -> Self {
        Self {
            node_types: vec![node_type],
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn sorted_by(mut self, field: NodeSortField, direction: SortDirection) -> Self {
        self.sort_by = field;
        self.direction = direction;
        self
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        (self.include_deleted || !node.is_deleted())
            && (self.node_types.is_empty() || self.node_types.contains(&node.node_type))
            && self.tag.as_ref().is_none_or(|tag| node.tags.contains(tag))
    }

    /// Filter, sort and page an unordered node collection
    pub fn apply(&self, nodes: impl IntoIterator<Item = Node>) -> Vec<Node> {
        let mut matched: Vec<Node> = nodes.into_iter().filter(|n| self.matches(n)).collect();
        matched.sort_by(|a, b| {
            let ordering = match self.sort_by {
                NodeSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                NodeSortField::ModifiedAt => a.modified_at.cmp(&b.modified_at),
                NodeSortField::Title => a.title.cmp(&b.title),
            };
            self.direction.apply(ordering.then_with(|| a.id.cmp(&b.id)))
        });
        self.page.slice(matched)
    }
}

/// Relationship listing query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipQuery {
    #[serde(default)]
    pub filter: RelationshipFilter,
    #[serde(default)]
    pub sort_by: RelationshipSortField,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub page: Page,
}

impl RelationshipQuery {
    pub fn new(filter: RelationshipFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: RelationshipSortField, direction: SortDirection) -> Self {
        self.sort_by = field;
        self.direction = direction;
        self
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    /// Filter, sort and page an unordered relationship collection
    pub fn apply(&self, relationships: impl IntoIterator<Item = Relationship>) -> Vec<Relationship> {
        let spec = self.filter.to_spec();
        let mut matched: Vec<Relationship> = relationships
            .into_iter()
            .filter(|r| spec.is_satisfied_by(r))
            .collect();
        matched.sort_by(|a, b| {
            let ordering = match self.sort_by {
                RelationshipSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                RelationshipSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                RelationshipSortField::Weight => a.weight.total_cmp(&b.weight),
                RelationshipSortField::Strength => a.strength.total_cmp(&b.strength),
                RelationshipSortField::Confidence => a.confidence.total_cmp(&b.confidence),
            };
            self.direction.apply(ordering.then_with(|| a.id.cmp(&b.id)))
        });
        self.page.slice(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rel(source: &str, target: &str, t: RelationshipType, weight: f64) -> Relationship {
        Relationship::new(source, target, t).with_weight(weight)
    }

    #[test]
    fn test_value_range() {
        let range = ValueRange::new(Some(0.2), Some(0.8));
        assert!(range.contains(0.2));
        assert!(range.contains(0.8));
        assert!(!range.contains(0.81));
        assert!(ValueRange::at_least(1.0).contains(5.0));
        assert!(!ValueRange::at_most(1.0).contains(5.0));
    }

    #[test]
    fn test_type_filter() {
        let filter = TypeFilter::include([NodeType::Note, NodeType::Concept]);
        assert!(filter.allows(&NodeType::Note));
        assert!(!filter.allows(&NodeType::Folder));

        let filter = TypeFilter::exclude([NodeType::Folder]);
        assert!(filter.allows(&NodeType::Note));
        assert!(!filter.allows(&NodeType::Folder));

        assert!(TypeFilter::<NodeType>::default().is_unrestricted());
    }

    #[test]
    fn test_filter_and_semantics() {
        let filter = RelationshipFilter::from_source("a")
            .with_types([RelationshipType::References])
            .with_weight(ValueRange::at_least(0.5))
            .verified(false);

        assert!(filter.matches(&rel("a", "b", RelationshipType::References, 1.0)));
        assert!(!filter.matches(&rel("a", "b", RelationshipType::References, 0.1)));
        assert!(!filter.matches(&rel("a", "b", RelationshipType::Uses, 1.0)));
        assert!(!filter.matches(&rel("c", "b", RelationshipType::References, 1.0)));

        let mut verified = rel("a", "b", RelationshipType::References, 1.0);
        verified.verified = true;
        assert!(!filter.matches(&verified));
    }

    #[test]
    fn test_filter_touching_and_created_range() {
        let r = rel("a", "b", RelationshipType::Related, 1.0);
        assert!(RelationshipFilter::touching("b").matches(&r));
        assert!(!RelationshipFilter::touching("z").matches(&r));

        let past = TimeRange {
            after: None,
            before: Some(r.created_at - Duration::hours(1)),
        };
        assert!(!RelationshipFilter::default().created_within(past).matches(&r));
        assert!(RelationshipFilter::default().matches(&r));
    }

    #[test]
    fn test_relationship_query_sort_and_page() {
        let rels = vec![
            rel("a", "b", RelationshipType::Uses, 0.3),
            rel("a", "c", RelationshipType::Uses, 0.9),
            rel("a", "d", RelationshipType::Uses, 0.6),
        ];
        let query = RelationshipQuery::new(RelationshipFilter::from_source("a"))
            .sorted_by(RelationshipSortField::Weight, SortDirection::Desc)
            .paged(Page::new(2, 1));

        let page = query.apply(rels);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].target_id, "d");
        assert_eq!(page[1].target_id, "b");
    }

    #[test]
    fn test_node_query() {
        let mut deleted = Node::with_id("3", "Gamma", NodeType::Note);
        deleted.deleted_at = Some(Utc::now());
        let nodes = vec![
            Node::with_id("1", "Beta", NodeType::Note).with_tags(["rust"]),
            Node::with_id("2", "Alpha", NodeType::Note).with_tags(["rust"]),
            Node::with_id("4", "Delta", NodeType::Concept).with_tags(["rust"]),
            deleted,
        ];

        let query = NodeQuery::of_type(NodeType::Note)
            .with_tag("rust")
            .sorted_by(NodeSortField::Title, SortDirection::Asc);
        let titles: Vec<_> = query.apply(nodes.clone()).into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);

        let all = NodeQuery::default().including_deleted().apply(nodes);
        assert_eq!(all.len(), 4);
    }
}
