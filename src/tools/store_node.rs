//! MCP `store_node` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::{Layer, MemoryNode, NodeKind};

/// Parameters for the `store_node` MCP tool.
///
/// Creates or updates an archive or shadow node. Core nodes cannot be
/// written through this tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreNodeParams {
    /// Omit to have an ID generated.
    #[schemars(description = "Node ID; omit to generate one. An existing ID updates that node")]
    pub id: Option<String>,

    #[schemars(description = "Layer: archive (verified history, default) or shadow (unverified)")]
    pub layer: Option<String>,

    #[schemars(
        description = "Kind: event, decision, insight, conflict, question, action, reflection"
    )]
    pub kind: String,

    #[schemars(description = "The claim or fact as free text")]
    pub content: String,

    #[schemars(description = "Precomputed relevance, 0.0-1.0")]
    pub resonance_score: Option<f64>,

    #[schemars(description = "Owner partition key")]
    pub owner_scope: Option<String>,

    #[schemars(description = "Opaque JSON attached to the node, stored as-is")]
    pub metrics_snapshot: Option<serde_json::Value>,
}

impl StoreNodeParams {
    /// Validate and build the node. `default_owner` applies when no owner is given.
    pub fn into_node(self, default_owner: Option<&str>) -> Result<MemoryNode, String> {
        let layer = match self.layer.as_deref() {
            Some(l) => l.parse::<Layer>()?,
            None => Layer::Archive,
        };
        if layer == Layer::Core {
            return Err("core nodes are seeded, not stored".into());
        }
        let kind: NodeKind = self.kind.parse()?;
        if self.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }

        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        let mut node = MemoryNode::new(id, layer, kind, self.content);
        if let Some(score) = self.resonance_score {
            if !(0.0..=1.0).contains(&score) {
                return Err("resonance_score must be between 0.0 and 1.0".into());
            }
            node = node.with_resonance(score);
        }
        if let Some(owner) = self.owner_scope.as_deref().or(default_owner) {
            node = node.with_owner(owner);
        }
        if let Some(snapshot) = self.metrics_snapshot {
            node = node.with_metrics(snapshot);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: serde_json::Value) -> StoreNodeParams {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn defaults_to_archive_with_generated_id() {
        let node = params(serde_json::json!({"kind": "event", "content": "Met Sam"}))
            .into_node(Some("alice"))
            .unwrap();
        assert_eq!(node.layer, Layer::Archive);
        assert!(!node.id.is_empty());
        assert_eq!(node.owner_scope.as_deref(), Some("alice"));
    }

    #[test]
    fn rejects_core_and_bad_fields() {
        let core = params(serde_json::json!({"layer": "core", "kind": "event", "content": "x"}));
        assert!(core.into_node(None).is_err());
        let kind = params(serde_json::json!({"kind": "rumor", "content": "x"}));
        assert!(kind.into_node(None).is_err());
        let score = params(serde_json::json!({"kind": "event", "content": "x", "resonance_score": 2.0}));
        assert!(score.into_node(None).is_err());
        let empty = params(serde_json::json!({"kind": "event", "content": "  "}));
        assert!(empty.into_node(None).is_err());
    }
}
