//! MCP `traverse_graph` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `traverse_graph` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TraverseGraphParams {
    #[schemars(description = "Node ID to start from")]
    pub start_id: String,

    #[schemars(description = "Maximum hops from the start node (default 3)")]
    pub max_depth: Option<u32>,

    #[schemars(description = "Ignore edges lighter than this, 0.0-1.0 (default 0.3)")]
    pub min_weight: Option<f64>,
}
