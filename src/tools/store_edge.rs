//! MCP `store_edge` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::{EdgeType, MemoryEdge};

/// Parameters for the `store_edge` MCP tool.
///
/// Creates a directed edge. A second edge with the same
/// (source, target, type) triple is rejected unless `update` is set, in
/// which case the existing edge's weight is changed instead.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreEdgeParams {
    #[schemars(description = "Source node ID")]
    pub source: String,

    #[schemars(description = "Target node ID")]
    pub target: String,

    #[schemars(
        description = "Edge type: causal, similarity, resonance, supports, contradicts, derives_from"
    )]
    pub r#type: String,

    #[schemars(description = "Edge strength, 0.0-1.0")]
    pub weight: f64,

    #[schemars(description = "Update the weight if this edge already exists (default false)")]
    pub update: Option<bool>,
}

impl StoreEdgeParams {
    pub fn to_edge(&self) -> Result<MemoryEdge, String> {
        let edge_type: EdgeType = self.r#type.parse()?;
        if !(0.0..=1.0).contains(&self.weight) {
            return Err("weight must be between 0.0 and 1.0".into());
        }
        Ok(MemoryEdge::new(
            self.source.clone(),
            self.target.clone(),
            edge_type,
            self.weight,
        ))
    }
}
