//! Keyword lookup over the FTS5 index.

use rusqlite::{params, Connection};

use super::store::{node_from_row, NODE_COLUMNS};
use crate::error::MemoryResult;
use crate::memory::types::{Layer, MemoryNode};
use crate::text;

/// A node matched by keyword lookup with its BM25-derived score
/// (higher is better).
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub node: MemoryNode,
    pub score: f64,
}

/// Restricts a keyword lookup.
#[derive(Debug, Clone)]
pub struct KeywordFilter<'a> {
    pub layers: &'a [Layer],
    /// Nodes with no owner are shared and always visible.
    pub owner_scope: Option<&'a str>,
    pub limit: usize,
}

/// Full-text lookup of `query` restricted to the given layers.
///
/// Terms are OR-joined so partial overlap still matches; BM25 orders the
/// hits, node id breaks ties. A query with no content-bearing terms
/// matches nothing.
pub fn keyword_search(
    conn: &Connection,
    query: &str,
    filter: &KeywordFilter<'_>,
) -> MemoryResult<Vec<KeywordHit>> {
    let Some(match_expr) = escape_fts_query(query) else {
        return Ok(Vec::new());
    };
    if filter.layers.is_empty() || filter.limit == 0 {
        return Ok(Vec::new());
    }

    // Layer names are fixed enum strings, safe to inline
    let layers = filter
        .layers
        .iter()
        .map(|l| format!("'{}'", l.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT {NODE_COLUMNS}, fts_rank FROM memory_nodes \
         JOIN (SELECT rowid AS fts_rowid, rank AS fts_rank FROM memory_nodes_fts \
               WHERE memory_nodes_fts MATCH ?1) ON memory_nodes.rowid = fts_rowid \
         WHERE layer IN ({layers}) \
           AND (?2 IS NULL OR owner_scope IS NULL OR owner_scope = ?2) \
         ORDER BY fts_rank, id LIMIT ?3"
    );

    let mut stmt = conn.prepare(&sql)?;
    let hits = stmt
        .query_map(
            params![match_expr, filter.owner_scope, filter.limit as i64],
            |row| {
                let node = node_from_row(row)?;
                let rank: f64 = row.get(9)?;
                Ok(KeywordHit { node, score: -rank })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(query, hits = hits.len(), "keyword search");
    Ok(hits)
}

/// Quote each content-bearing term and OR-join them. `None` when nothing
/// searchable remains.
fn escape_fts_query(query: &str) -> Option<String> {
    let terms = text::terms(query);
    if terms.is_empty() {
        return None;
    }
    let mut quoted: Vec<String> = terms
        .into_iter()
        .map(|t| format!("\"{}\"", t.replace('"', "")))
        .filter(|t| t != "\"\"")
        .collect();
    quoted.dedup();
    if quoted.is_empty() {
        return None;
    }
    Some(quoted.join(" OR "))
}
