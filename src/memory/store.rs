//! Graph Store: node and edge persistence with audit logging.
//!
//! Every write runs inside a transaction covering the row itself, the FTS5
//! index, the denormalized `related_ids` cache of affected nodes, and the
//! audit log. Layer `core` nodes are rejected by the normal write paths; they
//! enter only through [`put_core_node`] (seeding) and change only through
//! [`replace_core_node`] (administrative migration).

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::str::FromStr;

use crate::error::{MemoryError, MemoryResult};
use crate::memory::types::{EdgeType, Layer, MemoryEdge, MemoryNode, NodeFilter};

pub(crate) const NODE_COLUMNS: &str = "id, layer, kind, content, created_at, metrics_snapshot, \
                            resonance_score, related_ids, owner_scope";

const EDGE_COLUMNS: &str = "id, source, target, type, weight, created_at";

/// Result of [`put_node`].
#[derive(Debug, Serialize)]
pub struct PutNodeResult {
    pub id: String,
    /// `false` when an existing node was updated in place.
    pub created: bool,
}

/// Result of [`delete_node`].
#[derive(Debug, Serialize)]
pub struct DeleteNodeResult {
    pub id: String,
    pub edges_removed: usize,
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// Create or update a non-core node.
///
/// The caller's `related_ids` are ignored; the cache is derived from edges.
pub fn put_node(conn: &mut Connection, node: &MemoryNode) -> MemoryResult<PutNodeResult> {
    let tx = conn.transaction()?;
    let result = put_node_in(&tx, node)?;
    tx.commit()?;

    tracing::debug!(id = %node.id, layer = %node.layer, created = result.created, "node written");
    Ok(result)
}

/// Write a non-core node and its outgoing edges as one unit. If any edge is
/// rejected nothing is written.
pub fn put_node_with_edges(
    conn: &mut Connection,
    node: &MemoryNode,
    edges: &[MemoryEdge],
) -> MemoryResult<PutNodeResult> {
    let tx = conn.transaction()?;
    let result = put_node_in(&tx, node)?;
    for edge in edges {
        put_edge_in(&tx, edge)?;
    }
    tx.commit()?;

    tracing::debug!(id = %node.id, edges = edges.len(), "node written with edges");
    Ok(result)
}

fn put_node_in(tx: &Transaction<'_>, node: &MemoryNode) -> MemoryResult<PutNodeResult> {
    validate_node(node)?;
    if node.layer == Layer::Core {
        return Err(MemoryError::ConstraintViolation(format!(
            "core nodes are written only by seeding or migration: {}",
            node.id
        )));
    }

    let created = match fetch_row_meta(tx, &node.id)? {
        Some(existing) => {
            if existing.layer == Layer::Core {
                return Err(MemoryError::ConstraintViolation(format!(
                    "core node is immutable: {}",
                    node.id
                )));
            }
            overwrite_node(tx, &existing, node)?;
            write_audit_log(tx, "update", &node.id, None)?;
            false
        }
        None => {
            insert_node(tx, node)?;
            write_audit_log(tx, "create", &node.id, None)?;
            true
        }
    };
    Ok(PutNodeResult {
        id: node.id.clone(),
        created,
    })
}

/// Update an existing non-core node. Fails with `NotFound` if it does not exist.
pub fn update_node(conn: &mut Connection, node: &MemoryNode) -> MemoryResult<()> {
    if !node_exists(conn, &node.id)? {
        return Err(MemoryError::NotFound(format!("node {}", node.id)));
    }
    put_node(conn, node).map(|_| ())
}

/// Insert a `core` node if no node with that id exists. Returns `true` if inserted.
///
/// Administrative path used by canon seeding.
pub fn put_core_node(conn: &mut Connection, node: &MemoryNode) -> MemoryResult<bool> {
    validate_node(node)?;
    if node.layer != Layer::Core {
        return Err(MemoryError::ConstraintViolation(format!(
            "put_core_node requires layer=core, got {} for {}",
            node.layer, node.id
        )));
    }

    let tx = conn.transaction()?;
    if fetch_row_meta(&tx, &node.id)?.is_some() {
        return Ok(false);
    }
    insert_node(&tx, node)?;
    write_audit_log(&tx, "seed", &node.id, None)?;
    tx.commit()?;
    Ok(true)
}

/// Rewrite an existing `core` node. Administrative migration only.
pub fn replace_core_node(conn: &mut Connection, node: &MemoryNode) -> MemoryResult<()> {
    validate_node(node)?;
    let tx = conn.transaction()?;
    let existing = fetch_row_meta(&tx, &node.id)?
        .ok_or_else(|| MemoryError::NotFound(format!("node {}", node.id)))?;
    if existing.layer != Layer::Core || node.layer != Layer::Core {
        return Err(MemoryError::ConstraintViolation(format!(
            "replace_core_node only rewrites core nodes: {}",
            node.id
        )));
    }

    overwrite_node(&tx, &existing, node)?;
    write_audit_log(
        &tx,
        "migrate",
        &node.id,
        Some(&serde_json::json!({"previous_content": existing.content})),
    )?;
    tx.commit()?;

    tracing::warn!(id = %node.id, "core node rewritten by administrative migration");
    Ok(())
}

/// Point lookup.
pub fn get_node(conn: &Connection, id: &str) -> MemoryResult<MemoryNode> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM memory_nodes WHERE id = ?1"),
        params![id],
        node_from_row,
    )
    .optional()?
    .ok_or_else(|| MemoryError::NotFound(format!("node {id}")))
}

/// Batch lookup; unknown ids are skipped. Output follows input order.
pub fn get_nodes(conn: &Connection, ids: &[String]) -> MemoryResult<Vec<MemoryNode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM memory_nodes WHERE id = ?1"
    ))?;
    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(node) = stmt.query_row(params![id], node_from_row).optional()? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

pub fn node_exists(conn: &Connection, id: &str) -> MemoryResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM memory_nodes WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// List nodes matching the filter, newest first.
pub fn list_nodes(conn: &Connection, filter: &NodeFilter) -> MemoryResult<Vec<MemoryNode>> {
    let mut sql = format!(
        "SELECT {NODE_COLUMNS} FROM memory_nodes \
         WHERE (?1 IS NULL OR layer = ?1) AND (?2 IS NULL OR kind = ?2) \
         AND (?3 IS NULL OR owner_scope = ?3) ORDER BY created_at DESC, id"
    );
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let nodes = stmt
        .query_map(
            params![
                filter.layer.map(|l| l.as_str()),
                filter.kind.map(|k| k.as_str()),
                filter.owner_scope,
            ],
            node_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}

/// Delete a non-core node. Edges touching it cascade.
pub fn delete_node(conn: &mut Connection, id: &str) -> MemoryResult<DeleteNodeResult> {
    let tx = conn.transaction()?;
    let existing =
        fetch_row_meta(&tx, id)?.ok_or_else(|| MemoryError::NotFound(format!("node {id}")))?;
    if existing.layer == Layer::Core {
        return Err(MemoryError::ConstraintViolation(format!(
            "core node cannot be deleted: {id}"
        )));
    }

    let neighbors = neighbor_ids(&tx, id)?;
    let edges_removed: i64 = tx.query_row(
        "SELECT COUNT(*) FROM memory_edges WHERE source = ?1 OR target = ?1",
        params![id],
        |row| row.get(0),
    )?;

    delete_fts(&tx, existing.rowid, &existing.content, id, existing.layer)?;
    write_audit_log(
        &tx,
        "delete",
        id,
        Some(&serde_json::json!({"edges_removed": edges_removed})),
    )?;
    tx.execute("DELETE FROM memory_nodes WHERE id = ?1", params![id])?;

    for neighbor in neighbors.iter().filter(|n| n.as_str() != id) {
        refresh_related_ids(&tx, neighbor)?;
    }
    tx.commit()?;

    tracing::info!(id, edges_removed, "node deleted");
    Ok(DeleteNodeResult {
        id: id.to_string(),
        edges_removed: edges_removed as usize,
    })
}

// ── Edges ─────────────────────────────────────────────────────────────────────

/// Insert a new edge.
///
/// Fails with `ConstraintViolation` if either endpoint is missing, the edge is
/// a self-loop, or the `(source, target, type)` triple already exists. Use
/// [`update_edge_weight`] to change an existing edge.
pub fn put_edge(conn: &mut Connection, edge: &MemoryEdge) -> MemoryResult<()> {
    let tx = conn.transaction()?;
    put_edge_in(&tx, edge)?;
    tx.commit()?;
    Ok(())
}

fn put_edge_in(tx: &Transaction<'_>, edge: &MemoryEdge) -> MemoryResult<()> {
    check_unit_interval("weight", edge.weight)?;
    if edge.source == edge.target {
        return Err(MemoryError::ConstraintViolation(format!(
            "self-loop edge on {}",
            edge.source
        )));
    }

    for (role, endpoint) in [("source", &edge.source), ("target", &edge.target)] {
        if !node_exists(tx, endpoint)? {
            return Err(MemoryError::ConstraintViolation(format!(
                "dangling {role} endpoint: {endpoint}"
            )));
        }
    }

    let duplicate: Option<String> = tx
        .query_row(
            "SELECT id FROM memory_edges WHERE source = ?1 AND target = ?2 AND type = ?3",
            params![edge.source, edge.target, edge.edge_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing) = duplicate {
        return Err(MemoryError::ConstraintViolation(format!(
            "edge ({}, {}, {}) already exists as {existing}",
            edge.source, edge.target, edge.edge_type
        )));
    }

    tx.execute(
        "INSERT INTO memory_edges (id, source, target, type, weight, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            edge.id,
            edge.source,
            edge.target,
            edge.edge_type.as_str(),
            edge.weight,
            edge.created_at,
        ],
    )
    .map_err(map_constraint)?;

    refresh_related_ids(tx, &edge.source)?;
    refresh_related_ids(tx, &edge.target)?;
    write_audit_log(
        tx,
        "edge_create",
        &edge.id,
        Some(&serde_json::json!({
            "source": edge.source,
            "target": edge.target,
            "type": edge.edge_type.as_str(),
            "weight": edge.weight,
        })),
    )?;
    Ok(())
}

/// Explicit update path for an existing edge's weight.
pub fn update_edge_weight(conn: &mut Connection, edge_id: &str, weight: f64) -> MemoryResult<()> {
    check_unit_interval("weight", weight)?;
    let tx = conn.transaction()?;
    let rows = tx.execute(
        "UPDATE memory_edges SET weight = ?1 WHERE id = ?2",
        params![weight, edge_id],
    )?;
    if rows == 0 {
        return Err(MemoryError::NotFound(format!("edge {edge_id}")));
    }
    write_audit_log(
        &tx,
        "edge_update",
        edge_id,
        Some(&serde_json::json!({"weight": weight})),
    )?;
    tx.commit()?;
    Ok(())
}

pub fn delete_edge(conn: &mut Connection, edge_id: &str) -> MemoryResult<()> {
    let tx = conn.transaction()?;
    let endpoints: Option<(String, String)> = tx
        .query_row(
            "SELECT source, target FROM memory_edges WHERE id = ?1",
            params![edge_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (source, target) =
        endpoints.ok_or_else(|| MemoryError::NotFound(format!("edge {edge_id}")))?;

    tx.execute("DELETE FROM memory_edges WHERE id = ?1", params![edge_id])?;
    refresh_related_ids(&tx, &source)?;
    refresh_related_ids(&tx, &target)?;
    write_audit_log(&tx, "edge_delete", edge_id, None)?;
    tx.commit()?;
    Ok(())
}

pub fn get_edge(conn: &Connection, edge_id: &str) -> MemoryResult<MemoryEdge> {
    conn.query_row(
        &format!("SELECT {EDGE_COLUMNS} FROM memory_edges WHERE id = ?1"),
        params![edge_id],
        edge_from_row,
    )
    .optional()?
    .ok_or_else(|| MemoryError::NotFound(format!("edge {edge_id}")))
}

/// The edge for a `(source, target, type)` triple, if present.
pub fn find_edge(
    conn: &Connection,
    source: &str,
    target: &str,
    edge_type: EdgeType,
) -> MemoryResult<Option<MemoryEdge>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {EDGE_COLUMNS} FROM memory_edges \
                 WHERE source = ?1 AND target = ?2 AND type = ?3"
            ),
            params![source, target, edge_type.as_str()],
            edge_from_row,
        )
        .optional()?)
}

/// Outgoing edges of `id`, ordered by target then type.
pub fn edges_from(conn: &Connection, id: &str) -> MemoryResult<Vec<MemoryEdge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM memory_edges WHERE source = ?1 ORDER BY target, type"
    ))?;
    let edges = stmt
        .query_map(params![id], edge_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// Incoming edges of `id`, ordered by source then type.
pub fn edges_to(conn: &Connection, id: &str) -> MemoryResult<Vec<MemoryEdge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM memory_edges WHERE target = ?1 ORDER BY source, type"
    ))?;
    let edges = stmt
        .query_map(params![id], edge_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// Every edge, ordered by creation time then id.
pub fn list_edges(conn: &Connection) -> MemoryResult<Vec<MemoryEdge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM memory_edges ORDER BY created_at, id"
    ))?;
    let edges = stmt
        .query_map([], edge_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

// ── Audit log ─────────────────────────────────────────────────────────────────

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    subject_id: &str,
    details: Option<&serde_json::Value>,
) -> MemoryResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, subject_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, subject_id, details_json, now],
    )?;
    Ok(())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Fields of an existing row needed to rewrite it and its FTS entry.
struct RowMeta {
    rowid: i64,
    layer: Layer,
    content: String,
}

fn fetch_row_meta(conn: &Connection, id: &str) -> MemoryResult<Option<RowMeta>> {
    let row = conn
        .query_row(
            "SELECT rowid, layer, content FROM memory_nodes WHERE id = ?1",
            params![id],
            |row| {
                Ok(RowMeta {
                    rowid: row.get(0)?,
                    layer: parse_column(1, row.get(1)?)?,
                    content: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn insert_node(tx: &Transaction, node: &MemoryNode) -> MemoryResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let metrics = node
        .metrics_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    tx.execute(
        "INSERT INTO memory_nodes (id, layer, kind, content, created_at, metrics_snapshot, \
         resonance_score, related_ids, owner_scope, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?9)",
        params![
            node.id,
            node.layer.as_str(),
            node.kind.as_str(),
            node.content,
            node.created_at,
            metrics,
            node.resonance_score,
            node.owner_scope,
            now,
        ],
    )
    .map_err(map_constraint)?;

    insert_fts(tx, tx.last_insert_rowid(), &node.content, &node.id, node.layer)
}

fn overwrite_node(tx: &Transaction, existing: &RowMeta, node: &MemoryNode) -> MemoryResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let metrics = node
        .metrics_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    delete_fts(tx, existing.rowid, &existing.content, &node.id, existing.layer)?;
    tx.execute(
        "UPDATE memory_nodes SET layer = ?1, kind = ?2, content = ?3, created_at = ?4, \
         metrics_snapshot = ?5, resonance_score = ?6, owner_scope = ?7, updated_at = ?8 \
         WHERE id = ?9",
        params![
            node.layer.as_str(),
            node.kind.as_str(),
            node.content,
            node.created_at,
            metrics,
            node.resonance_score,
            node.owner_scope,
            now,
            node.id,
        ],
    )?;
    insert_fts(tx, existing.rowid, &node.content, &node.id, node.layer)
}

/// Sync the FTS5 index. Must use the same rowid as the `memory_nodes` row.
fn insert_fts(tx: &Transaction, rowid: i64, content: &str, id: &str, layer: Layer) -> MemoryResult<()> {
    tx.execute(
        "INSERT INTO memory_nodes_fts (rowid, content, id, layer) VALUES (?1, ?2, ?3, ?4)",
        params![rowid, content, id, layer.as_str()],
    )?;
    Ok(())
}

/// External-content FTS5 tables need the old values to remove an entry.
fn delete_fts(tx: &Transaction, rowid: i64, content: &str, id: &str, layer: Layer) -> MemoryResult<()> {
    tx.execute(
        "INSERT INTO memory_nodes_fts (memory_nodes_fts, rowid, content, id, layer) \
         VALUES ('delete', ?1, ?2, ?3, ?4)",
        params![rowid, content, id, layer.as_str()],
    )?;
    Ok(())
}

fn neighbor_ids(conn: &Connection, id: &str) -> MemoryResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT target FROM memory_edges WHERE source = ?1 \
         UNION SELECT source FROM memory_edges WHERE target = ?1 ORDER BY 1",
    )?;
    let ids = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Rebuild the `related_ids` cache of one node from its edges.
fn refresh_related_ids(tx: &Transaction, id: &str) -> MemoryResult<()> {
    let related = neighbor_ids(tx, id)?;
    tx.execute(
        "UPDATE memory_nodes SET related_ids = ?1 WHERE id = ?2",
        params![serde_json::to_string(&related)?, id],
    )?;
    Ok(())
}

fn validate_node(node: &MemoryNode) -> MemoryResult<()> {
    if node.id.trim().is_empty() {
        return Err(MemoryError::ConstraintViolation("node id must not be empty".into()));
    }
    if let Some(score) = node.resonance_score {
        check_unit_interval("resonance_score", score)?;
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f64) -> MemoryResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MemoryError::ConstraintViolation(format!(
            "{name} must be within [0.0, 1.0], got {value}"
        )));
    }
    Ok(())
}

/// Surface SQLite constraint failures (e.g. a racing duplicate insert) as
/// `ConstraintViolation` rather than a generic storage error.
fn map_constraint(e: rusqlite::Error) -> MemoryError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            MemoryError::ConstraintViolation(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        other => MemoryError::Storage(other),
    }
}

fn parse_column<T: FromStr<Err = String>>(idx: usize, value: String) -> rusqlite::Result<T> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

pub(crate) fn node_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryNode> {
    let metrics: Option<String> = row.get(5)?;
    let related: String = row.get(7)?;
    Ok(MemoryNode {
        id: row.get(0)?,
        layer: parse_column(1, row.get(1)?)?,
        kind: parse_column(2, row.get(2)?)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        metrics_snapshot: metrics.and_then(|s| serde_json::from_str(&s).ok()),
        resonance_score: row.get(6)?,
        related_ids: serde_json::from_str(&related).unwrap_or_default(),
        owner_scope: row.get(8)?,
    })
}

pub(crate) fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryEdge> {
    Ok(MemoryEdge {
        id: row.get(0)?,
        source: row.get(1)?,
        target: row.get(2)?,
        edge_type: parse_column(3, row.get(3)?)?,
        weight: row.get(4)?,
        created_at: row.get(5)?,
    })
}
