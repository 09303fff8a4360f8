//! SQLite implementation of the GraphRepository
//!
//! Filtered listings are built with `QueryBuilder` so every predicate is a
//! bound parameter. Timestamps are stored as fixed-width RFC 3339 strings
//! so range filters compare lexicographically.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::domain::graph::{
    GraphRepository, Node, NodeQuery, NodeType, Page, Relationship, RelationshipQuery,
    RelationshipType, ValueRange,
};
use crate::error::{Error, Result};

/// SQLite implementation of the graph repository
#[derive(Clone)]
pub struct SqliteGraphRepository {
    pool: SqlitePool,
}

impl SqliteGraphRepository {
    /// Create a new SQLite graph repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Format a timestamp for storage
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, falling back to now for malformed values
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn push_page(builder: &mut QueryBuilder<'_, Sqlite>, page: &Page) {
    match page.limit {
        Some(limit) => {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        None if page.offset > 0 => {
            builder.push(" LIMIT -1");
        }
        None => return,
    }
    builder.push(" OFFSET ").push_bind(page.offset as i64);
}

fn push_range(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, range: &ValueRange) {
    if let Some(min) = range.min {
        builder.push(format!(" AND {} >= ", column)).push_bind(min);
    }
    if let Some(max) = range.max {
        builder.push(format!(" AND {} <= ", column)).push_bind(max);
    }
}

#[async_trait]
impl GraphRepository for SqliteGraphRepository {
    // ========== Node Operations ==========

    async fn save_node(&self, node: &Node) -> Result<()> {
        let tags_json = serde_json::to_string(&node.tags)?;
        let metadata_json = serde_json::to_string(&node.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO nodes (
                id, node_type, title, content, tags, metadata,
                created_at, modified_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                metadata = excluded.metadata,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                deleted_at = excluded.deleted_at
            "#,
        )
        .bind(&node.id)
        .bind(node.node_type.as_str())
        .bind(&node.title)
        .bind(&node.content)
        .bind(&tags_json)
        .bind(&metadata_json)
        .bind(format_timestamp(&node.created_at))
        .bind(format_timestamp(&node.modified_at))
        .bind(node.deleted_at.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await?;

        debug!(node_id = %node.id, title = %node.title, "Node saved");
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_node()).transpose()
    }

    async fn list_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM nodes WHERE 1 = 1");

        if !query.include_deleted {
            builder.push(" AND deleted_at IS NULL");
        }
        if !query.node_types.is_empty() {
            builder.push(" AND node_type IN (");
            let mut separated = builder.separated(", ");
            for node_type in &query.node_types {
                separated.push_bind(node_type.as_str());
            }
            separated.push_unseparated(")");
        }
        if let Some(tag) = &query.tag {
            builder
                .push(" AND EXISTS (SELECT 1 FROM json_each(nodes.tags) WHERE json_each.value = ")
                .push_bind(tag.clone())
                .push(")");
        }

        let direction = query.direction.as_sql();
        builder.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort_by.column(),
            direction,
            direction
        ));
        push_page(&mut builder, &query.page);

        let rows: Vec<NodeRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(node_id = %id, "Node deleted");
        }
        Ok(deleted)
    }

    async fn count_nodes(&self) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM nodes WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    // ========== Relationship Operations ==========

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let properties_json = serde_json::to_string(&relationship.properties)?;

        sqlx::query(
            r#"
            INSERT INTO relationships (
                id, source_id, target_id, relationship_type, weight, bidirectional,
                strength, confidence, automatic, verified, description, context,
                evidence, properties, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_id = excluded.source_id,
                target_id = excluded.target_id,
                relationship_type = excluded.relationship_type,
                weight = excluded.weight,
                bidirectional = excluded.bidirectional,
                strength = excluded.strength,
                confidence = excluded.confidence,
                automatic = excluded.automatic,
                verified = excluded.verified,
                description = excluded.description,
                context = excluded.context,
                evidence = excluded.evidence,
                properties = excluded.properties,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&relationship.id)
        .bind(&relationship.source_id)
        .bind(&relationship.target_id)
        .bind(relationship.relationship_type.as_str())
        .bind(relationship.weight)
        .bind(relationship.bidirectional)
        .bind(relationship.strength)
        .bind(relationship.confidence)
        .bind(relationship.automatic)
        .bind(relationship.verified)
        .bind(&relationship.description)
        .bind(&relationship.context)
        .bind(&relationship.evidence)
        .bind(&properties_json)
        .bind(format_timestamp(&relationship.created_at))
        .bind(format_timestamp(&relationship.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(
            relationship_id = %relationship.id,
            source = %relationship.source_id,
            target = %relationship.target_id,
            "Relationship saved"
        );
        Ok(())
    }

    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        let row: Option<RelationshipRow> =
            sqlx::query_as("SELECT * FROM relationships WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_relationship()).transpose()
    }

    async fn get_relationship_between(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>> {
        let row: Option<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT * FROM relationships
            WHERE source_id = ? AND target_id = ? AND relationship_type = ?
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .bind(relationship_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_relationship()).transpose()
    }

    async fn list_relationships(&self, query: &RelationshipQuery) -> Result<Vec<Relationship>> {
        let filter = &query.filter;
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM relationships WHERE 1 = 1");

        if let Some(source_id) = &filter.source_id {
            builder.push(" AND source_id = ").push_bind(source_id.clone());
        }
        if let Some(target_id) = &filter.target_id {
            builder.push(" AND target_id = ").push_bind(target_id.clone());
        }
        if let Some(node_id) = &filter.node_id {
            builder
                .push(" AND (source_id = ")
                .push_bind(node_id.clone())
                .push(" OR target_id = ")
                .push_bind(node_id.clone())
                .push(")");
        }
        if !filter.types.is_empty() {
            builder.push(" AND relationship_type IN (");
            let mut separated = builder.separated(", ");
            for relationship_type in &filter.types {
                separated.push_bind(relationship_type.as_str());
            }
            separated.push_unseparated(")");
        }
        if let Some(range) = &filter.weight {
            push_range(&mut builder, "weight", range);
        }
        if let Some(range) = &filter.strength {
            push_range(&mut builder, "strength", range);
        }
        if let Some(range) = &filter.confidence {
            push_range(&mut builder, "confidence", range);
        }
        if let Some(verified) = filter.verified {
            builder.push(" AND verified = ").push_bind(verified);
        }
        if let Some(automatic) = filter.automatic {
            builder.push(" AND automatic = ").push_bind(automatic);
        }
        if let Some(created) = &filter.created {
            if let Some(after) = &created.after {
                builder.push(" AND created_at >= ").push_bind(format_timestamp(after));
            }
            if let Some(before) = &created.before {
                builder.push(" AND created_at <= ").push_bind(format_timestamp(before));
            }
        }

        let direction = query.direction.as_sql();
        builder.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort_by.column(),
            direction,
            direction
        ));
        push_page(&mut builder, &query.page);

        let rows: Vec<RelationshipRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_relationship()).collect()
    }

    async fn relationships_for_node(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let rows: Vec<RelationshipRow> = sqlx::query_as(
            r#"
            SELECT * FROM relationships
            WHERE source_id = ? OR target_id = ?
            ORDER BY weight DESC, id
            "#,
        )
        .bind(node_id)
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_relationship()).collect()
    }

    async fn outgoing_relationships(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let rows: Vec<RelationshipRow> = sqlx::query_as(
            "SELECT * FROM relationships WHERE source_id = ? ORDER BY weight DESC, id",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_relationship()).collect()
    }

    async fn incoming_relationships(&self, node_id: &str) -> Result<Vec<Relationship>> {
        let rows: Vec<RelationshipRow> = sqlx::query_as(
            "SELECT * FROM relationships WHERE target_id = ? ORDER BY weight DESC, id",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_relationship()).collect()
    }

    async fn delete_relationship(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM relationships WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(relationship_id = %id, "Relationship deleted");
        }
        Ok(deleted)
    }

    async fn delete_relationships_for_node(&self, node_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM relationships WHERE source_id = ? OR target_id = ?")
            .bind(node_id)
            .bind(node_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_relationships(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct NodeRow {
    id: String,
    node_type: String,
    title: String,
    content: String,
    tags: String,
    metadata: String,
    created_at: String,
    modified_at: String,
    deleted_at: Option<String>,
}

impl NodeRow {
    fn into_node(self) -> Result<Node> {
        let node_type = NodeType::parse(&self.node_type)
            .ok_or_else(|| Error::Other(format!("Invalid node type: {}", self.node_type)))?;

        let tags = serde_json::from_str(&self.tags).unwrap_or_default();
        let metadata: Map<String, Value> = serde_json::from_str(&self.metadata).unwrap_or_default();

        Ok(Node {
            id: self.id,
            node_type,
            title: self.title,
            content: self.content,
            tags,
            metadata,
            created_at: parse_timestamp(&self.created_at),
            modified_at: parse_timestamp(&self.modified_at),
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp),
        })
    }
}

#[derive(Debug, FromRow)]
struct RelationshipRow {
    id: String,
    source_id: String,
    target_id: String,
    relationship_type: String,
    weight: f64,
    bidirectional: bool,
    strength: f64,
    confidence: f64,
    automatic: bool,
    verified: bool,
    description: Option<String>,
    context: Option<String>,
    evidence: Option<String>,
    properties: String,
    created_at: String,
    updated_at: String,
}

impl RelationshipRow {
    fn into_relationship(self) -> Result<Relationship> {
        let relationship_type = RelationshipType::parse(&self.relationship_type).ok_or_else(|| {
            Error::Other(format!("Invalid relationship type: {}", self.relationship_type))
        })?;

        let properties: Map<String, Value> =
            serde_json::from_str(&self.properties).unwrap_or_default();

        Ok(Relationship {
            id: self.id,
            source_id: self.source_id,
            target_id: self.target_id,
            relationship_type,
            weight: self.weight,
            bidirectional: self.bidirectional,
            strength: self.strength,
            confidence: self.confidence,
            automatic: self.automatic,
            verified: self.verified,
            description: self.description,
            context: self.context,
            evidence: self.evidence,
            properties,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}
