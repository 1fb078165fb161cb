mod helpers;

use ember::config::EmberConfig;
use ember::engine::MemoryEngine;
use ember::error::MemoryError;
use ember::ledger::EvidenceLabel;
use ember::memory::types::{EdgeType, Layer, MemoryEdge, MemoryNode, NodeKind};
use ember::seed::seed_canon;
use ember::sift::QueryOptions;
use ember::sources::{InMemorySource, SourceCategory};
use helpers::{shared, test_db};
use std::sync::Arc;
use tempfile::TempDir;

/// Engine over a seeded database with the default graph-backed registry.
fn seeded_engine() -> MemoryEngine {
    let mut conn = test_db();
    seed_canon(&mut conn, false).unwrap();
    let db = shared(conn);
    let config = EmberConfig::default();
    let registry = MemoryEngine::default_registry(&db, &config).unwrap();
    MemoryEngine::new(db, registry, Arc::new(config))
}

#[tokio::test]
async fn graph_memories_come_back_tagged() {
    let engine = seeded_engine();
    for (id, text) in [
        ("ev-1", "Maya started pottery classes on Tuesdays"),
        ("ev-2", "Maya started pottery classes on Tuesdays"),
    ] {
        engine
            .put_node(MemoryNode::new(id, Layer::Archive, NodeKind::Event, text))
            .await
            .unwrap();
    }
    engine
        .put_node(MemoryNode::new(
            "dec-1",
            Layer::Archive,
            NodeKind::Decision,
            "Keep Tuesday evenings free for pottery",
        ))
        .await
        .unwrap();
    engine
        .put_edge(MemoryEdge::new("ev-1", "dec-1", EdgeType::Causal, 0.8))
        .await
        .unwrap();

    let response = engine.query("pottery classes", &QueryOptions::default()).await.unwrap();

    let ids: Vec<&str> = response.passages.iter().map(|p| p.passage.identifier.as_str()).collect();
    assert!(ids.contains(&"ev-1") && ids.contains(&"ev-2") && ids.contains(&"dec-1"));
    for p in &response.passages {
        assert_eq!(p.passage.category, SourceCategory::Project);
        assert!(p.evidence.confidence.value() < 1.0);
    }
    let decision = response
        .passages
        .iter()
        .find(|p| p.passage.identifier == "dec-1")
        .unwrap();
    assert_eq!(decision.evidence.label, EvidenceLabel::Design);
    assert_eq!(decision.passage.anchor.as_deref(), Some("archive/decision"));
    let event = response
        .passages
        .iter()
        .find(|p| p.passage.identifier == "ev-1")
        .unwrap();
    assert_eq!(event.evidence.label, EvidenceLabel::Fact);
    assert!(event.render().starts_with("[fact "));
}

#[tokio::test]
async fn canon_answers_questions_about_itself() {
    let engine = seeded_engine();
    let response = engine
        .query("what is the source precedence", &QueryOptions::default())
        .await
        .unwrap();

    let canon: Vec<_> = response
        .passages
        .iter()
        .filter(|p| p.passage.category == SourceCategory::Canon)
        .collect();
    assert!(!canon.is_empty());
    assert!(canon.iter().all(|p| p.evidence.label == EvidenceLabel::Quote));
}

#[tokio::test]
async fn missing_external_sources_are_reported_as_skipped() {
    let engine = seeded_engine();
    let response = engine
        .query("verify the latest bridge schedule", &QueryOptions::default())
        .await
        .unwrap();

    assert!(response.skipped_categories.contains(&SourceCategory::Web));
    assert!(response.failures.is_empty());
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let engine = seeded_engine();
    let err = engine.query("   ", &QueryOptions::default()).await.unwrap_err();
    assert!(matches!(err, MemoryError::ConstraintViolation(_)));
}

#[tokio::test]
async fn unresolved_conflict_can_be_archived() {
    let mut conn = test_db();
    seed_canon(&mut conn, false).unwrap();
    let db = shared(conn);
    let registry = helpers::registry()
        .with_source(Arc::new(
            InMemorySource::new(SourceCategory::Canon)
                .with_text("c1", "The lantern is lit")
                .with_text("c2", "The lantern is not lit"),
        ));
    let engine = helpers::engine(db, registry);

    let response = engine.query("lantern", &QueryOptions::default()).await.unwrap();
    let record = response.conflicts.iter().find(|c| !c.resolved).unwrap();

    let id = engine.archive_conflict(record).await.unwrap();
    let node = engine.get_node(&id).await.unwrap();
    assert_eq!(node.layer, Layer::Archive);
    assert_eq!(node.kind, NodeKind::Conflict);
    assert!(node.content.contains("lantern"));
    assert!(node.metrics_snapshot.is_some());
}

#[tokio::test]
async fn open_seeds_an_on_disk_database() {
    let tmp = TempDir::new().unwrap();
    let mut config = EmberConfig::default();
    config.storage.db_path = tmp.path().join("memory.db").to_string_lossy().into_owned();

    let engine = MemoryEngine::open(config.clone()).unwrap();
    let stats = engine.stats().await.unwrap();
    assert!(stats.by_layer["core"] > 0);
    drop(engine);

    // Second open reseeds nothing
    let engine = MemoryEngine::open(config).unwrap();
    let again = engine.stats().await.unwrap();
    assert_eq!(again.total_nodes, stats.total_nodes);
    assert_eq!(again.total_edges, stats.total_edges);
}

#[tokio::test]
async fn huge_resonance_limit_leaves_engine_usable() {
    let engine = seeded_engine();
    engine
        .put_node(MemoryNode::new("n1", Layer::Archive, NodeKind::Insight, "Glass floats").with_resonance(0.7))
        .await
        .unwrap();

    let found = engine.find_resonant(0.3, 1usize << 60).await.unwrap();
    assert!(found.iter().any(|n| n.id == "n1"));

    assert_eq!(engine.get_node("n1").await.unwrap().content, "Glass floats");
    engine
        .put_node(MemoryNode::new("n2", Layer::Archive, NodeKind::Event, "Second write"))
        .await
        .unwrap();
}

#[tokio::test]
async fn on_disk_reads_see_earlier_writes() {
    let tmp = TempDir::new().unwrap();
    let mut config = EmberConfig::default();
    config.storage.db_path = tmp.path().join("memory.db").to_string_lossy().into_owned();
    config.storage.read_connections = 2;

    let engine = MemoryEngine::open(config).unwrap();
    assert_eq!(engine.db().reader_count(), 2);
    engine
        .put_node(MemoryNode::new("ev-1", Layer::Archive, NodeKind::Event, "The kiln was fired"))
        .await
        .unwrap();

    assert_eq!(engine.get_node("ev-1").await.unwrap().content, "The kiln was fired");
    let response = engine.query("kiln fired", &QueryOptions::default()).await.unwrap();
    assert!(response.passages.iter().any(|p| p.passage.identifier == "ev-1"));
}
