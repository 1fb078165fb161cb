use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::MemoryResult;
use crate::memory::types::{EdgeType, Layer, NodeKind};

/// Graph store statistics.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_nodes: u64,
    pub total_edges: u64,
    pub by_layer: BTreeMap<String, u64>,
    pub by_kind: BTreeMap<String, u64>,
    pub by_edge_type: BTreeMap<String, u64>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_node: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_node: Option<i64>,
}

/// Compute graph statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn graph_stats(conn: &Connection, db_path: Option<&Path>) -> MemoryResult<StatsResponse> {
    let total_nodes: i64 = conn.query_row("SELECT COUNT(*) FROM memory_nodes", [], |row| row.get(0))?;
    let total_edges: i64 = conn.query_row("SELECT COUNT(*) FROM memory_edges", [], |row| row.get(0))?;

    let by_layer = count_grouped(
        conn,
        "SELECT layer, COUNT(*) FROM memory_nodes GROUP BY layer",
        [Layer::Core, Layer::Archive, Layer::Shadow].iter().map(|l| l.as_str()),
    )?;
    let by_kind = count_grouped(
        conn,
        "SELECT kind, COUNT(*) FROM memory_nodes GROUP BY kind",
        NodeKind::ALL.iter().map(|k| k.as_str()),
    )?;
    let by_edge_type = count_grouped(
        conn,
        "SELECT type, COUNT(*) FROM memory_edges GROUP BY type",
        EdgeType::ALL.iter().map(|t| t.as_str()),
    )?;

    let (oldest_node, newest_node) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM memory_nodes",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_nodes: total_nodes as u64,
        total_edges: total_edges as u64,
        by_layer,
        by_kind,
        by_edge_type,
        db_size_bytes,
        oldest_node,
        newest_node,
    })
}

/// Run a `SELECT key, COUNT(*) ... GROUP BY key` query, zero-filling `keys`.
fn count_grouped<'a>(
    conn: &Connection,
    sql: &str,
    keys: impl Iterator<Item = &'a str>,
) -> MemoryResult<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = keys.map(|k| (k.to_string(), 0)).collect();
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (key, count) in rows {
        map.insert(key, count as u64);
    }
    Ok(map)
}
