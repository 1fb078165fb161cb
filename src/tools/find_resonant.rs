//! MCP `find_resonant` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `find_resonant` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindResonantParams {
    #[schemars(description = "Minimum resonance score, 0.0-1.0 (default 0.3)")]
    pub min_score: Option<f64>,

    #[schemars(description = "Maximum nodes to return (default 10)")]
    pub limit: Option<usize>,
}
