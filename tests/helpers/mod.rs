#![allow(dead_code)]

use async_trait::async_trait;
use ember::config::EmberConfig;
use ember::db::{self, SharedConnection};
use ember::engine::MemoryEngine;
use ember::error::{MemoryError, MemoryResult};
use ember::memory::store;
use ember::memory::types::{EdgeType, Layer, MemoryEdge, MemoryNode, NodeKind};
use ember::sources::{KeywordClassifier, Passage, RetrievalSource, SourceCategory, SourceRegistry};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn shared(conn: Connection) -> SharedConnection {
    SharedConnection::new(conn)
}

/// Insert a node. Core nodes go through the seeding path.
pub fn insert_node(
    conn: &mut Connection,
    id: &str,
    layer: Layer,
    kind: NodeKind,
    content: &str,
    resonance: Option<f64>,
) {
    let mut node = MemoryNode::new(id, layer, kind, content);
    if let Some(score) = resonance {
        node = node.with_resonance(score);
    }
    if layer == Layer::Core {
        assert!(store::put_core_node(conn, &node).unwrap());
    } else {
        store::put_node(conn, &node).unwrap();
    }
}

/// Insert an edge with a readable id. Returns the id.
pub fn link(conn: &mut Connection, source: &str, target: &str, edge_type: EdgeType, weight: f64) -> String {
    let edge = MemoryEdge::new(source, target, edge_type, weight)
        .with_id(format!("{source}-{}-{target}", edge_type.as_str()));
    store::put_edge(conn, &edge).unwrap();
    edge.id
}

pub fn registry() -> SourceRegistry {
    SourceRegistry::new(Arc::new(KeywordClassifier::default()))
}

pub fn engine(db: SharedConnection, registry: SourceRegistry) -> MemoryEngine {
    MemoryEngine::new(db, registry, Arc::new(EmberConfig::default()))
}

/// A source that always fails.
pub struct FailingSource(pub SourceCategory);

#[async_trait]
impl RetrievalSource for FailingSource {
    fn category(&self) -> SourceCategory {
        self.0
    }

    async fn retrieve(&self, _query: &str, _limit: usize) -> MemoryResult<Vec<Passage>> {
        Err(MemoryError::RetrievalUnavailable {
            category: self.0,
            reason: "upstream returned 503".into(),
        })
    }
}

/// A source that answers with fixed passages after a delay.
pub struct SlowSource {
    pub category: SourceCategory,
    pub delay: Duration,
    pub passages: Vec<(String, String)>,
}

#[async_trait]
impl RetrievalSource for SlowSource {
    fn category(&self) -> SourceCategory {
        self.category
    }

    async fn retrieve(&self, _query: &str, limit: usize) -> MemoryResult<Vec<Passage>> {
        tokio::time::sleep(self.delay).await;
        Ok(self
            .passages
            .iter()
            .take(limit)
            .map(|(id, text)| Passage::new(self.category, id.clone(), text.clone()))
            .collect())
    }
}
