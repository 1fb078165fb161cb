//! Core graph type definitions.
//!
//! Defines [`Layer`] (core / archive / shadow), [`NodeKind`] (domain tag),
//! [`EdgeType`], the [`MemoryNode`] and [`MemoryEdge`] records, and the
//! read-side shapes returned by traversal and fan-out lookups.

use serde::{Deserialize, Serialize};

/// Storage layer of a memory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Small, immutable, pre-seeded canonical knowledge.
    Core,
    /// Accumulated verified history.
    Archive,
    /// Unverified or hypothetical material.
    Shadow,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Archive => "archive",
            Self::Shadow => "shadow",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(Self::Core),
            "archive" => Ok(Self::Archive),
            "shadow" => Ok(Self::Shadow),
            _ => Err(format!("unknown layer: {s}")),
        }
    }
}

/// Domain tag carried by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Event,
    Decision,
    Insight,
    CanonStatement,
    Conflict,
    Question,
    Action,
    Reflection,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        Self::Event,
        Self::Decision,
        Self::Insight,
        Self::CanonStatement,
        Self::Conflict,
        Self::Question,
        Self::Action,
        Self::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Decision => "decision",
            Self::Insight => "insight",
            Self::CanonStatement => "canon_statement",
            Self::Conflict => "conflict",
            Self::Question => "question",
            Self::Action => "action",
            Self::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown node kind: {s}"))
    }
}

/// Relation carried by a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Causal,
    Similarity,
    Resonance,
    Supports,
    Contradicts,
    DerivesFrom,
}

impl EdgeType {
    pub const ALL: [EdgeType; 6] = [
        Self::Causal,
        Self::Similarity,
        Self::Resonance,
        Self::Supports,
        Self::Contradicts,
        Self::DerivesFrom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Causal => "causal",
            Self::Similarity => "similarity",
            Self::Resonance => "resonance",
            Self::Supports => "supports",
            Self::Contradicts => "contradicts",
            Self::DerivesFrom => "derives_from",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown edge type: {s}"))
    }
}

/// One atomic unit of knowledge, matching the `memory_nodes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Caller- or system-assigned key.
    pub id: String,
    pub layer: Layer,
    pub kind: NodeKind,
    /// The claim or fact, as free text.
    pub content: String,
    /// Logical timestamp in milliseconds; later wins recency tie-breaks.
    pub created_at: i64,
    /// Opaque attached state. Stored and returned, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_snapshot: Option<serde_json::Value>,
    /// Precomputed relevance in `[0.0, 1.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resonance_score: Option<f64>,
    /// Denormalized neighbor ids. Display cache only; edges are authoritative.
    #[serde(default)]
    pub related_ids: Vec<String>,
    /// Multi-tenant partition key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_scope: Option<String>,
}

impl MemoryNode {
    /// New node stamped with the current wall clock.
    pub fn new(
        id: impl Into<String>,
        layer: Layer,
        kind: NodeKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            layer,
            kind,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            metrics_snapshot: None,
            resonance_score: None,
            related_ids: Vec::new(),
            owner_scope: None,
        }
    }

    pub fn with_resonance(mut self, score: f64) -> Self {
        self.resonance_score = Some(score);
        self
    }

    pub fn with_owner(mut self, owner_scope: impl Into<String>) -> Self {
        self.owner_scope = Some(owner_scope.into());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metrics(mut self, snapshot: serde_json::Value) -> Self {
        self.metrics_snapshot = Some(snapshot);
        self
    }
}

/// A directed, typed, weighted relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Edge strength in `[0.0, 1.0]`, used to prune traversal.
    pub weight: f64,
    pub created_at: i64,
}

impl MemoryEdge {
    /// New edge with a UUID v7 id.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
        weight: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            source: source.into(),
            target: target.into(),
            edge_type,
            weight,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Single-node fan-out read.
#[derive(Debug, Clone, Serialize)]
pub struct NodeWithEdges {
    pub node: MemoryNode,
    pub outgoing: Vec<MemoryEdge>,
    pub incoming: Vec<MemoryEdge>,
}

/// One entry of a breadth-first walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalStep {
    pub node_id: String,
    pub depth: u32,
    /// Node ids from the start node to `node_id`, inclusive. Never repeats an id.
    pub path: Vec<String>,
}

/// Optional filters for listing nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub layer: Option<Layer>,
    pub kind: Option<NodeKind>,
    pub owner_scope: Option<String>,
    pub limit: Option<usize>,
}
