//! The memory core's entry point.
//!
//! [`MemoryEngine`] owns the shared connection and the SIFT orchestrator and
//! exposes the four caller operations (`query`, `traverse`, `find_resonant`,
//! `get_with_edges`) plus graph writes. Storage work runs on the blocking
//! pool; nothing in the query path writes to the graph.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::config::EmberConfig;
use crate::db::{self, SharedConnection};
use crate::error::{MemoryError, MemoryResult};
use crate::ledger::{self, AnnotatedPassage};
use crate::memory::store::{self, DeleteNodeResult, PutNodeResult};
use crate::memory::types::{
    EdgeType, Layer, MemoryEdge, MemoryNode, NodeFilter, NodeKind, NodeWithEdges, TraversalStep,
};
use crate::memory::{now_millis, stats, traversal};
use crate::seed;
use crate::sift::{
    ConflictRecord, QueryOptions, RetrievalFailure, RoundReport, SiftOrchestrator, SiftSettings,
    Termination, TraceWarning,
};
use crate::sources::{
    Classification, GraphSource, HttpSource, KeywordClassifier, SourceCategory, SourceRegistry,
};

/// The context bundle handed back for one query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub passages: Vec<AnnotatedPassage>,
    pub conflicts: Vec<ConflictRecord>,
    pub sift_iterations: u32,
    pub conflicts_resolved: usize,
    pub termination: Termination,
    pub classification: Classification,
    pub rounds: Vec<RoundReport>,
    pub failures: Vec<RetrievalFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_categories: Vec<SourceCategory>,
    /// Sourcing concerns from the trace step.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct MemoryEngine {
    db: SharedConnection,
    orchestrator: SiftOrchestrator,
    config: Arc<EmberConfig>,
}

impl MemoryEngine {
    pub fn new(db: SharedConnection, registry: SourceRegistry, config: Arc<EmberConfig>) -> Self {
        let orchestrator = SiftOrchestrator::new(registry, SiftSettings::from_config(&config.sift));
        Self {
            db,
            orchestrator,
            config,
        }
    }

    /// Build the default registry: graph-backed canon and project, plus
    /// HTTP sources for whichever external categories have an endpoint.
    pub fn default_registry(db: &SharedConnection, config: &EmberConfig) -> anyhow::Result<SourceRegistry> {
        let classifier = Arc::new(KeywordClassifier::new(&config.classifier));
        let mut registry = SourceRegistry::new(classifier)
            .with_source(Arc::new(GraphSource::canon(db.clone(), &config.retrieval)))
            .with_source(Arc::new(GraphSource::project(
                db.clone(),
                &config.retrieval,
                config.storage.default_owner_scope.clone(),
            )));

        for (category, source_config) in [
            (SourceCategory::ConnectedKnowledge, &config.sources.connected_knowledge),
            (SourceCategory::Web, &config.sources.web),
        ] {
            if let Some(source) = HttpSource::from_config(category, source_config)
                .with_context(|| format!("failed to configure {category} source"))?
            {
                registry.register(Arc::new(source));
            }
        }
        Ok(registry)
    }

    /// Open the configured database, seed canon, and wire the default registry.
    pub fn open(config: EmberConfig) -> anyhow::Result<Self> {
        let db_path = config.resolved_db_path();
        let mut conn = db::open_database(&db_path)?;
        seed::seed_canon(&mut conn, false).context("failed to seed canon")?;
        tracing::info!(db = %db_path.display(), "database ready");

        let db = SharedConnection::with_readers(conn, &db_path, config.storage.read_connections)?;
        let registry = Self::default_registry(&db, &config)?;
        Ok(Self::new(db, registry, Arc::new(config)))
    }

    pub fn db(&self) -> &SharedConnection {
        &self.db
    }

    pub fn config(&self) -> &EmberConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &SiftOrchestrator {
        &self.orchestrator
    }

    /// Default options from config.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::from_config(&self.config)
    }

    /// Retrieve, reconcile and annotate evidence for `text`.
    pub async fn query(&self, text: &str, options: &QueryOptions) -> MemoryResult<QueryResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MemoryError::ConstraintViolation("query must not be empty".into()));
        }

        let outcome = self.orchestrator.run(text, options).await;
        let conflicts_resolved = outcome.conflicts_resolved();
        let passages = ledger::annotate(
            &outcome.evidence,
            self.orchestrator.settings().similarity_threshold,
        )?;

        Ok(QueryResponse {
            passages,
            conflicts: outcome.conflicts,
            sift_iterations: outcome.sift_iterations,
            conflicts_resolved,
            termination: outcome.termination,
            classification: outcome.classification,
            rounds: outcome.rounds,
            failures: outcome.failures,
            skipped_categories: outcome.skipped_categories,
            warnings: outcome.warnings,
            elapsed_ms: outcome.elapsed_ms,
        })
    }

    pub async fn traverse(
        &self,
        start_id: &str,
        max_depth: u32,
        min_weight: f64,
    ) -> MemoryResult<Vec<TraversalStep>> {
        let start_id = start_id.to_string();
        self.db.read(move |conn| {
            traversal::traverse(conn, &start_id, max_depth, min_weight)
        })
        .await
    }

    pub async fn find_resonant(&self, min_score: f64, limit: usize) -> MemoryResult<Vec<MemoryNode>> {
        self.db.read(move |conn| traversal::find_resonant(conn, min_score, limit)).await
    }

    pub async fn get_with_edges(&self, id: &str) -> MemoryResult<NodeWithEdges> {
        let id = id.to_string();
        self.db.read(move |conn| traversal::get_with_edges(conn, &id)).await
    }

    pub async fn get_node(&self, id: &str) -> MemoryResult<MemoryNode> {
        let id = id.to_string();
        self.db.read(move |conn| store::get_node(conn, &id)).await
    }

    pub async fn list_nodes(&self, filter: NodeFilter) -> MemoryResult<Vec<MemoryNode>> {
        self.db.read(move |conn| store::list_nodes(conn, &filter)).await
    }

    pub async fn put_node(&self, node: MemoryNode) -> MemoryResult<PutNodeResult> {
        self.db.write(move |conn| store::put_node(conn, &node)).await
    }

    pub async fn update_node(&self, node: MemoryNode) -> MemoryResult<()> {
        self.db.write(move |conn| store::update_node(conn, &node)).await
    }

    pub async fn delete_node(&self, id: &str) -> MemoryResult<DeleteNodeResult> {
        let id = id.to_string();
        self.db.write(move |conn| store::delete_node(conn, &id)).await
    }

    pub async fn put_edge(&self, edge: MemoryEdge) -> MemoryResult<MemoryEdge> {
        self.db.write(move |conn| {
            store::put_edge(conn, &edge)?;
            Ok(edge)
        })
        .await
    }

    pub async fn find_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
    ) -> MemoryResult<Option<MemoryEdge>> {
        let (source, target) = (source.to_string(), target.to_string());
        self.db.read(move |conn| store::find_edge(conn, &source, &target, edge_type)).await
    }

    pub async fn update_edge_weight(&self, edge_id: &str, weight: f64) -> MemoryResult<()> {
        let edge_id = edge_id.to_string();
        self.db.write(move |conn| store::update_edge_weight(conn, &edge_id, weight)).await
    }

    pub async fn delete_edge(&self, edge_id: &str) -> MemoryResult<()> {
        let edge_id = edge_id.to_string();
        self.db.write(move |conn| store::delete_edge(conn, &edge_id)).await
    }

    pub async fn stats(&self) -> MemoryResult<stats::StatsResponse> {
        let path = self.config.resolved_db_path();
        self.db.read(move |conn| stats::graph_stats(conn, Some(path.as_path()))).await
    }

    /// Persist a conflict as an archive node of kind `conflict`, with
    /// `derives_from` edges to every graph-backed position that still
    /// exists. Returns the new node id.
    pub async fn archive_conflict(&self, record: &ConflictRecord) -> MemoryResult<String> {
        let id = format!("conflict-{}", uuid::Uuid::now_v7());
        let mut node = MemoryNode::new(
            id.clone(),
            Layer::Archive,
            NodeKind::Conflict,
            format!("Contested: {}", record.claim),
        )
        .with_metrics(serde_json::to_value(record)?)
        .with_created_at(now_millis());
        if let Some(owner) = &self.config.storage.default_owner_scope {
            node = node.with_owner(owner.clone());
        }

        let mut targets: Vec<String> = record
            .positions
            .iter()
            .filter_map(|p| p.node_id.clone())
            .collect();
        targets.sort();
        targets.dedup();

        self.db.write(move |conn| {
            let mut edges = Vec::with_capacity(targets.len());
            for target in targets {
                if !store::node_exists(conn, &target)? {
                    tracing::warn!(conflict = %node.id, target = %target, "position node missing, edge skipped");
                    continue;
                }
                edges.push(MemoryEdge::new(node.id.clone(), target, EdgeType::DerivesFrom, 1.0));
            }
            store::put_node_with_edges(conn, &node, &edges)?;
            tracing::info!(id = %node.id, edges = edges.len(), "conflict archived");
            Ok(())
        })
        .await?;
        Ok(id)
    }
}
