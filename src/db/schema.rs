//! SQL DDL for all tables.
//!
//! Defines `memory_nodes`, `memory_edges`, `memory_nodes_fts` (FTS5),
//! `memory_log`, and `schema_meta`. All DDL uses `IF NOT EXISTS` for
//! idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Memory graph nodes
CREATE TABLE IF NOT EXISTS memory_nodes (
    id TEXT PRIMARY KEY,
    layer TEXT NOT NULL CHECK(layer IN ('core','archive','shadow')),
    kind TEXT NOT NULL CHECK(kind IN ('event','decision','insight','canon_statement','conflict','question','action','reflection')),
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    metrics_snapshot TEXT,
    resonance_score REAL CHECK(resonance_score IS NULL OR (resonance_score >= 0.0 AND resonance_score <= 1.0)),
    related_ids TEXT NOT NULL DEFAULT '[]',
    owner_scope TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_layer_kind ON memory_nodes(layer, kind);
CREATE INDEX IF NOT EXISTS idx_nodes_resonance ON memory_nodes(resonance_score DESC);
CREATE INDEX IF NOT EXISTS idx_nodes_owner ON memory_nodes(owner_scope);

-- Directed, typed, weighted edges
CREATE TABLE IF NOT EXISTS memory_edges (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL REFERENCES memory_nodes(id) ON DELETE CASCADE,
    target TEXT NOT NULL REFERENCES memory_nodes(id) ON DELETE CASCADE,
    type TEXT NOT NULL CHECK(type IN ('causal','similarity','resonance','supports','contradicts','derives_from')),
    weight REAL NOT NULL CHECK(weight >= 0.0 AND weight <= 1.0),
    created_at INTEGER NOT NULL,
    UNIQUE(source, target, type)
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON memory_edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON memory_edges(target);
CREATE INDEX IF NOT EXISTS idx_edges_weight ON memory_edges(weight DESC);

-- Keyword lookup (BM25) over node content
CREATE VIRTUAL TABLE IF NOT EXISTS memory_nodes_fts USING fts5(
    content,
    id UNINDEXED,
    layer UNINDEXED,
    content='memory_nodes',
    content_rowid='rowid'
);

-- Audit log
CREATE TABLE IF NOT EXISTS memory_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','update','delete','edge_create','edge_update','edge_delete','seed','migrate')),
    subject_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"memory_nodes".to_string()));
        assert!(tables.contains(&"memory_edges".to_string()));
        assert!(tables.contains(&"memory_nodes_fts".to_string()));
        assert!(tables.contains(&"memory_log".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO memory_nodes (id, layer, kind, content, created_at, updated_at)
             VALUES ('a', 'archive', 'event', 'a', 1, 'now'), ('b', 'archive', 'event', 'b', 2, 'now');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO memory_edges (id, source, target, type, weight, created_at)
             VALUES ('e', 'a', 'b', 'supports', 1.5, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
