//! Cairn Core Integration Tests

use std::fs;
use std::sync::Arc;

use cairn_core::domain::cache::{CacheConfig, CacheWarmer, CachedGraphQueries, QueryCache, WarmupPlan};
use cairn_core::domain::graph::{
    EventBus, GraphEvent, GraphStore, Node, NodeQuery, NodeType, RelationshipAttrs, RelationshipType,
};
use cairn_core::domain::import::{AdapterRegistry, ImportPipeline};
use cairn_core::domain::query::{PathOptions, SubgraphOptions};
use cairn_core::infrastructure::{SqliteCacheBackend, SqliteGraphRepository};
use cairn_core::storage::Database;
use tempfile::TempDir;

const BODY: &str = "Enough body text to clear the minimum content length used by validation.";

fn vault() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join(".obsidian")).unwrap();
    fs::create_dir_all(root.join("Areas")).unwrap();
    fs::write(root.join("Home.md"), format!("{}\n\nStart at [[Garden]].\n", BODY)).unwrap();
    fs::write(
        root.join("Areas/Garden.md"),
        format!("---\ntags: [outdoors]\n---\n{}\n\nSee [[Tools]] and [[Tools]] again.\n", BODY),
    )
    .unwrap();
    fs::write(root.join("Areas/Tools.md"), format!("{}\n", BODY)).unwrap();
    dir
}

async fn sqlite_store(db: &Database) -> Arc<GraphStore<SqliteGraphRepository>> {
    let repository = Arc::new(SqliteGraphRepository::new(db.pool().clone()));
    Arc::new(GraphStore::new(repository).with_events(EventBus::new()))
}

#[tokio::test]
async fn test_import_then_query_over_sqlite() {
    let db = Database::in_memory().await.unwrap();
    let store = sqlite_store(&db).await;
    let vault = vault();

    let pipeline = ImportPipeline::new(store.clone(), AdapterRegistry::with_defaults());
    let report = pipeline.import(vault.path(), None).await.unwrap();
    assert_eq!(report.source_type, "obsidian");
    assert_eq!(report.nodes_created, 3);
    assert!(report.failures.is_empty());

    let docs = store.list_nodes(&NodeQuery::of_type(NodeType::Document)).await.unwrap();
    let home = docs.iter().find(|n| n.title == "Home").unwrap();
    let tools = docs.iter().find(|n| n.title == "Tools").unwrap();

    let queries = CachedGraphQueries::new(store.repository().clone(), QueryCache::new(CacheConfig::default()));

    let path = queries
        .find_path(&home.id, &tools.id, &PathOptions::shortest(5))
        .await
        .unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(path.first().unwrap().node_id, home.id);
    assert_eq!(path.last().unwrap().node_id, tools.id);

    // Garden links to Tools twice
    let garden_to_tools = path.last().unwrap().via.as_ref().unwrap();
    assert_eq!(garden_to_tools.relationship_type, RelationshipType::References);
    assert_eq!(garden_to_tools.weight, 2.0);

    let subgraph = queries.subgraph(&home.id, &SubgraphOptions::new(1, 100)).await.unwrap();
    assert_eq!(subgraph.nodes[0].node.id, home.id);
    assert!(subgraph.nodes.iter().all(|n| n.depth <= 1));

    let metrics = queries.network_metrics().await.unwrap();
    assert_eq!(metrics.node_count, 5);
    assert_eq!(metrics.relationship_types.get("REFERENCES"), Some(&2));
    assert_eq!(metrics.relationship_types.get("PART_OF"), Some(&3));
}

#[tokio::test]
async fn test_events_drive_cache_invalidation() {
    let db = Database::in_memory().await.unwrap();
    let store = sqlite_store(&db).await;
    let mut events = store.events().subscribe();

    let queries = CachedGraphQueries::new(store.repository().clone(), QueryCache::new(CacheConfig::default()));

    let a = store.create_node(Node::new("A", NodeType::Concept)).await.unwrap();
    let b = store.create_node(Node::new("B", NodeType::Concept)).await.unwrap();
    assert_eq!(queries.network_metrics().await.unwrap().edge_count, 0);

    store
        .create_relationship(&a.id, &b.id, RelationshipType::Related, RelationshipAttrs::default())
        .await
        .unwrap();

    // Still the cached answer until the event is applied
    assert_eq!(queries.network_metrics().await.unwrap().edge_count, 0);

    let mut saw_relationship = false;
    while let Ok(event) = events.try_recv() {
        saw_relationship |= matches!(event, GraphEvent::RelationshipCreated { .. });
        queries.invalidate_for(&event).await;
    }
    assert!(saw_relationship);
    assert_eq!(queries.network_metrics().await.unwrap().edge_count, 1);
}

#[tokio::test]
async fn test_persisted_cache_restores_into_fresh_instance() {
    let db = Database::in_memory().await.unwrap();
    let store = sqlite_store(&db).await;
    let vault = vault();
    ImportPipeline::new(store.clone(), AdapterRegistry::with_defaults())
        .import(vault.path(), None)
        .await
        .unwrap();

    let backend = Arc::new(SqliteCacheBackend::new(db.pool().clone()));
    let cache = QueryCache::new(CacheConfig::default()).with_backend(backend.clone());
    let queries = CachedGraphQueries::new(store.repository().clone(), cache);

    let report = CacheWarmer::new(queries.clone()).warm(&WarmupPlan::default()).await;
    assert!(report.failures.is_empty());
    assert!(!report.warmed.is_empty());

    let fresh = QueryCache::new(CacheConfig::default()).with_backend(backend);
    let restored = fresh.restore().await.unwrap();
    assert_eq!(restored, queries.cache().len().await);
    for key in &report.warmed {
        assert!(fresh.contains(key).await, "missing {}", key);
    }
}
