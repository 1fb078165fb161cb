//! MCP `inspect_node` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `inspect_node` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InspectNodeParams {
    #[schemars(description = "Node ID to inspect")]
    pub id: String,
}
