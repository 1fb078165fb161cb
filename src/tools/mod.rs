pub mod find_resonant;
pub mod inspect_node;
pub mod query_memory;
pub mod store_edge;
pub mod store_node;
pub mod traverse_graph;

use find_resonant::FindResonantParams;
use inspect_node::InspectNodeParams;
use query_memory::QueryMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use store_edge::StoreEdgeParams;
use store_node::StoreNodeParams;
use traverse_graph::TraverseGraphParams;

use crate::engine::MemoryEngine;

/// The Ember MCP tool handler. Wraps a [`MemoryEngine`] and exposes the
/// query, graph and write tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct EmberTools {
    tool_router: ToolRouter<Self>,
    engine: MemoryEngine,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl EmberTools {
    pub fn new(engine: MemoryEngine) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Retrieve evidence for a query, reconciling conflicting sources.
    #[tool(description = "Retrieve memories and source passages for a query. Conflicting sources are re-queried (at most 3 rounds) and settled by corroboration or source precedence (canon > project > connectedKnowledge > web). Every passage carries an evidence label and a confidence below 1.0.")]
    async fn query_memory(
        &self,
        Parameters(params): Parameters<QueryMemoryParams>,
    ) -> Result<String, String> {
        let options = params.options(self.engine.query_options())?;
        tracing::info!(
            query_len = params.query.len(),
            requery = options.enable_requery,
            "query_memory called"
        );

        let response = self
            .engine
            .query(&params.query, &options)
            .await
            .map_err(|e| format!("query failed: {e}"))?;

        tracing::info!(
            passages = response.passages.len(),
            conflicts = response.conflicts.len(),
            iterations = response.sift_iterations,
            termination = ?response.termination,
            "query answered"
        );

        if params.archive_conflicts.unwrap_or(false) {
            for record in response.conflicts.iter().filter(|c| !c.resolved) {
                self.engine
                    .archive_conflict(record)
                    .await
                    .map_err(|e| format!("archiving conflict failed: {e}"))?;
            }
        }

        to_json(&response)
    }

    /// Walk outgoing edges from a node.
    #[tool(description = "Breadth-first walk of outgoing edges from a node. Returns (node, depth, path) entries; a node reachable at several depths appears once per depth with the lexicographically smallest path. Paths never repeat a node. Edges below min_weight are not followed.")]
    async fn traverse_graph(
        &self,
        Parameters(params): Parameters<TraverseGraphParams>,
    ) -> Result<String, String> {
        let retrieval = &self.engine.config().retrieval;
        let max_depth = params.max_depth.unwrap_or(retrieval.traverse_max_depth);
        let min_weight = params.min_weight.unwrap_or(retrieval.traverse_min_weight);
        if !(0.0..=1.0).contains(&min_weight) {
            return Err("min_weight must be between 0.0 and 1.0".into());
        }
        tracing::info!(start = %params.start_id, max_depth, min_weight, "traverse_graph called");

        let steps = self
            .engine
            .traverse(&params.start_id, max_depth, min_weight)
            .await
            .map_err(|e| format!("traverse failed: {e}"))?;
        to_json(&serde_json::json!({ "steps": steps, "total": steps.len() }))
    }

    /// List the highest-resonance nodes.
    #[tool(description = "List nodes whose resonance score is at least min_score, highest first.")]
    async fn find_resonant(
        &self,
        Parameters(params): Parameters<FindResonantParams>,
    ) -> Result<String, String> {
        let min_score = params.min_score.unwrap_or(self.engine.config().retrieval.min_score);
        let limit = params.limit.unwrap_or(self.engine.config().retrieval.max_memories);
        tracing::info!(min_score, limit, "find_resonant called");

        let nodes = self
            .engine
            .find_resonant(min_score, limit)
            .await
            .map_err(|e| format!("find_resonant failed: {e}"))?;
        to_json(&serde_json::json!({ "nodes": nodes, "total": nodes.len() }))
    }

    /// Inspect one node and its edges.
    #[tool(description = "Inspect a node by ID with its incoming and outgoing edges.")]
    async fn inspect_node(
        &self,
        Parameters(params): Parameters<InspectNodeParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "inspect_node called");
        let detail = self
            .engine
            .get_with_edges(&params.id)
            .await
            .map_err(|e| format!("inspect failed: {e}"))?;
        to_json(&detail)
    }

    /// Create or update an archive or shadow node.
    #[tool(description = "Store a node in the archive (verified history) or shadow (unverified) layer. Kinds: event, decision, insight, conflict, question, action, reflection. Core canon nodes are read-only.")]
    async fn store_node(
        &self,
        Parameters(params): Parameters<StoreNodeParams>,
    ) -> Result<String, String> {
        let default_owner = self.engine.config().storage.default_owner_scope.clone();
        let node = params.into_node(default_owner.as_deref())?;
        tracing::info!(
            id = %node.id,
            layer = %node.layer,
            kind = %node.kind,
            content_len = node.content.len(),
            "store_node called"
        );

        let result = self
            .engine
            .put_node(node)
            .await
            .map_err(|e| format!("store failed: {e}"))?;
        tracing::info!(id = %result.id, created = result.created, "node stored");
        to_json(&result)
    }

    /// Create a typed edge, or update an existing edge's weight.
    #[tool(description = "Create a directed, typed, weighted edge. Types: causal, similarity, resonance, supports, contradicts, derives_from. Set update=true to change the weight of an existing edge instead of failing.")]
    async fn store_edge(
        &self,
        Parameters(params): Parameters<StoreEdgeParams>,
    ) -> Result<String, String> {
        let edge = params.to_edge()?;
        tracing::info!(
            source = %edge.source,
            target = %edge.target,
            edge_type = %edge.edge_type,
            weight = edge.weight,
            "store_edge called"
        );

        if params.update.unwrap_or(false) {
            let existing = self
                .engine
                .find_edge(&edge.source, &edge.target, edge.edge_type)
                .await
                .map_err(|e| format!("lookup failed: {e}"))?;
            if let Some(existing) = existing {
                self.engine
                    .update_edge_weight(&existing.id, edge.weight)
                    .await
                    .map_err(|e| format!("update failed: {e}"))?;
                return to_json(&serde_json::json!({
                    "id": existing.id,
                    "created": false,
                    "weight": edge.weight,
                }));
            }
        }

        let stored = self
            .engine
            .put_edge(edge)
            .await
            .map_err(|e| format!("store failed: {e}"))?;
        to_json(&serde_json::json!({
            "id": stored.id,
            "created": true,
            "weight": stored.weight,
        }))
    }
}

#[tool_handler]
impl ServerHandler for EmberTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Ember is a companion memory server. Use query_memory to retrieve evidence, \
                 traverse_graph and inspect_node to explore the memory graph, and \
                 store_node / store_edge to record new memories."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
