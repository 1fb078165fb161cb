//! Graph-backed retrieval for the canon and project categories.

use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

use super::{Passage, RetrievalSource, SourceCategory};
use crate::config::RetrievalConfig;
use crate::db::SharedConnection;
use crate::error::MemoryResult;
use crate::ledger::EvidenceLabel;
use crate::memory::search::{keyword_search, KeywordFilter};
use crate::memory::store;
use crate::memory::traversal;
use crate::memory::types::{Layer, MemoryNode, NodeKind};

/// Keyword lookup to find seed nodes, then BFS expansion from each seed.
/// Only nodes in this source's layers are returned, so a canon walk that
/// crosses into archive nodes does not report them as canon.
pub struct GraphSource {
    db: SharedConnection,
    scope: GraphScope,
}

/// What a [`GraphSource`] may see and how far it walks.
#[derive(Debug, Clone)]
struct GraphScope {
    category: SourceCategory,
    layers: Vec<Layer>,
    owner_scope: Option<String>,
    seed_limit: usize,
    max_depth: u32,
    min_weight: f64,
}

impl GraphSource {
    /// Canon: the core layer.
    pub fn canon(db: SharedConnection, config: &RetrievalConfig) -> Self {
        Self {
            db,
            scope: GraphScope {
                category: SourceCategory::Canon,
                layers: vec![Layer::Core],
                owner_scope: None,
                seed_limit: config.seed_limit,
                max_depth: config.traverse_max_depth,
                min_weight: config.traverse_min_weight,
            },
        }
    }

    /// Project: the archive layer, plus shadow when `include_shadow` is set.
    pub fn project(
        db: SharedConnection,
        config: &RetrievalConfig,
        owner_scope: Option<String>,
    ) -> Self {
        let mut layers = vec![Layer::Archive];
        if config.include_shadow {
            layers.push(Layer::Shadow);
        }
        Self {
            db,
            scope: GraphScope {
                category: SourceCategory::Project,
                layers,
                owner_scope,
                seed_limit: config.seed_limit,
                max_depth: config.traverse_max_depth,
                min_weight: config.traverse_min_weight,
            },
        }
    }
}

impl GraphScope {
    fn collect(&self, conn: &Connection, query: &str, limit: usize) -> MemoryResult<Vec<Passage>> {
        let hits = keyword_search(
            conn,
            query,
            &KeywordFilter {
                layers: &self.layers,
                owner_scope: self.owner_scope.as_deref(),
                limit: self.seed_limit.max(1),
            },
        )?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut ordered: Vec<MemoryNode> = Vec::new();
        for hit in &hits {
            if seen.insert(hit.node.id.clone()) {
                ordered.push(hit.node.clone());
            }
        }

        // Expansion results follow the seeds, in traversal order
        let mut expanded: Vec<String> = Vec::new();
        for hit in &hits {
            for step in traversal::traverse(conn, &hit.node.id, self.max_depth, self.min_weight)? {
                if step.depth > 0 && seen.insert(step.node_id.clone()) {
                    expanded.push(step.node_id);
                }
            }
        }
        let mut by_id: HashMap<String, MemoryNode> = store::get_nodes(conn, &expanded)?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        for id in &expanded {
            if let Some(node) = by_id.remove(id) {
                if self.accepts(&node) {
                    ordered.push(node);
                }
            }
        }

        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|node| self.passage(node))
            .collect())
    }

    fn accepts(&self, node: &MemoryNode) -> bool {
        self.layers.contains(&node.layer)
            && match (&self.owner_scope, &node.owner_scope) {
                (Some(wanted), Some(owner)) => wanted == owner,
                _ => true,
            }
    }

    fn passage(&self, node: MemoryNode) -> Passage {
        let hint = label_hint(node.layer, node.kind);
        let passage = Passage::new(self.category, node.id.clone(), node.content)
            .with_anchor(format!("{}/{}", node.layer, node.kind))
            .with_node(node.id)
            .with_resonance(node.resonance_score);
        match hint {
            Some(label) => passage.with_label_hint(label),
            None => passage,
        }
    }
}

/// Label implied by where a node lives or what it records.
fn label_hint(layer: Layer, kind: NodeKind) -> Option<EvidenceLabel> {
    match (layer, kind) {
        (Layer::Core, _) => Some(EvidenceLabel::Quote),
        (Layer::Shadow, _) => Some(EvidenceLabel::Hypothesis),
        (_, NodeKind::Decision) => Some(EvidenceLabel::Design),
        (_, NodeKind::Action) => Some(EvidenceLabel::Plan),
        _ => None,
    }
}

#[async_trait]
impl RetrievalSource for GraphSource {
    fn category(&self) -> SourceCategory {
        self.scope.category
    }

    async fn retrieve(&self, query: &str, limit: usize) -> MemoryResult<Vec<Passage>> {
        let scope = self.scope.clone();
        let query = query.to_string();
        self.db.read(move |conn| scope.collect(conn, &query, limit)).await
    }
}
