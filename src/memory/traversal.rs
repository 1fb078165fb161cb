//! Traversal & ranking engine.
//!
//! [`traverse`] is a breadth-first walk over outgoing edges bounded by depth
//! and minimum edge weight. [`find_resonant`] is a top-k selection by
//! resonance score using a bounded heap. [`get_with_edges`] is a single-node
//! fan-out read.

use rusqlite::{params, Connection};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use super::store::{self, node_from_row, NODE_COLUMNS};
use crate::error::{MemoryError, MemoryResult};
use crate::memory::types::{MemoryNode, NodeWithEdges, TraversalStep};

/// Default traversal depth for callers that do not specify one.
pub const DEFAULT_MAX_DEPTH: u32 = 3;
/// Default minimum edge weight for callers that do not specify one.
pub const DEFAULT_MIN_WEIGHT: f64 = 0.3;

/// Simple paths carried from one depth to the next. Past this, the
/// lexicographically smallest paths are kept.
pub const MAX_FRONTIER_PATHS: usize = 4096;

/// Breadth-first walk from `start_id`.
///
/// Follows only outgoing edges with `weight >= min_weight` and stops expanding
/// at `max_depth`. Every simple path is expanded, so a node appears at each
/// depth it can be reached at without repeating a node. Each `(node, depth)`
/// pair is reported once, carrying the lexicographically smallest path that
/// reaches it, so output is ordered by depth then node id and is reproducible.
pub fn traverse(
    conn: &Connection,
    start_id: &str,
    max_depth: u32,
    min_weight: f64,
) -> MemoryResult<Vec<TraversalStep>> {
    if !store::node_exists(conn, start_id)? {
        return Err(MemoryError::NotFound(format!("node {start_id}")));
    }
    if min_weight.is_nan() {
        return Err(MemoryError::ConstraintViolation("min_weight is NaN".into()));
    }

    let mut stmt = conn.prepare(
        "SELECT DISTINCT target FROM memory_edges \
         WHERE source = ?1 AND weight >= ?2 ORDER BY target",
    )?;
    let mut neighbors: HashMap<String, Vec<String>> = HashMap::new();

    let start_path = vec![start_id.to_string()];
    let mut steps = vec![TraversalStep {
        node_id: start_id.to_string(),
        depth: 0,
        path: start_path.clone(),
    }];
    let mut frontier = vec![start_path];

    for depth in 1..=max_depth {
        let mut extended_paths: Vec<Vec<String>> = Vec::new();

        for path in &frontier {
            let Some(last) = path.last() else { continue };
            if !neighbors.contains_key(last) {
                let targets = stmt
                    .query_map(params![last, min_weight], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                neighbors.insert(last.clone(), targets);
            }

            for target in &neighbors[last] {
                if path.contains(target) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(target.clone());
                extended_paths.push(extended);
            }
        }

        if extended_paths.is_empty() {
            break;
        }
        extended_paths.sort();
        if extended_paths.len() > MAX_FRONTIER_PATHS {
            tracing::warn!(
                start = start_id,
                depth,
                paths = extended_paths.len(),
                kept = MAX_FRONTIER_PATHS,
                "traversal frontier truncated"
            );
            extended_paths.truncate(MAX_FRONTIER_PATHS);
        }

        // Sorted, so the first path seen for a node is its smallest
        let mut level: BTreeMap<&str, &Vec<String>> = BTreeMap::new();
        for path in &extended_paths {
            if let Some(last) = path.last() {
                level.entry(last.as_str()).or_insert(path);
            }
        }
        steps.extend(level.into_iter().map(|(node_id, path)| TraversalStep {
            node_id: node_id.to_string(),
            depth,
            path: path.clone(),
        }));
        frontier = extended_paths;
    }

    tracing::debug!(start = start_id, max_depth, min_weight, steps = steps.len(), "traversal complete");
    Ok(steps)
}

/// Heap entry ordered by score, then recency, then id ascending.
struct Ranked {
    score: f64,
    node: MemoryNode,
}

impl Ranked {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.node.created_at.cmp(&other.node.created_at))
            .then_with(|| other.node.id.cmp(&self.node.id))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_key(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key(other)
    }
}

/// Top `limit` nodes with `resonance_score >= min_score`, ordered by score
/// descending then recency descending. Nodes without a score never match.
pub fn find_resonant(
    conn: &Connection,
    min_score: f64,
    limit: usize,
) -> MemoryResult<Vec<MemoryNode>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM memory_nodes \
         WHERE resonance_score IS NOT NULL AND resonance_score >= ?1"
    ))?;
    let rows = stmt.query_map(params![min_score], node_from_row)?;

    // Min-heap of the best `limit` seen so far
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::new();
    for row in rows {
        let node = row?;
        let score = node.resonance_score.unwrap_or(0.0);
        heap.push(Reverse(Ranked { score, node }));
        if heap.len() > limit {
            heap.pop();
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| ranked.node)
        .collect())
}

/// Node plus its outgoing and incoming edges. No traversal.
pub fn get_with_edges(conn: &Connection, id: &str) -> MemoryResult<NodeWithEdges> {
    let node = store::get_node(conn, id)?;
    let outgoing = store::edges_from(conn, id)?;
    let incoming = store::edges_to(conn, id)?;
    Ok(NodeWithEdges {
        node,
        outgoing,
        incoming,
    })
}
