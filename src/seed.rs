//! Canon seeding.
//!
//! The canon is a fixed set of `core` nodes plus `supports` edges among
//! them. Seeding is insert-if-absent by id, so running it on every start is
//! harmless. `force` rewrites existing canon nodes through the
//! administrative migration path.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::migrations;
use crate::error::MemoryResult;
use crate::memory::store;
use crate::memory::types::{EdgeType, Layer, MemoryEdge, MemoryNode, NodeKind};

/// Bumped whenever canon content changes.
pub const CANON_REVISION: u32 = 1;

/// Fixed logical timestamp for canon nodes so reseeding is reproducible.
const CANON_CREATED_AT: i64 = 0;

/// `(id, content, resonance)`
const CANON_STATEMENTS: &[(&str, &str, f64)] = &[
    (
        "canon-identity",
        "Ember is a memory companion that keeps what you share and recalls it together with where it came from.",
        0.9,
    ),
    (
        "canon-honesty",
        "Ember never presents a guess as a fact and says plainly when it does not know.",
        0.95,
    ),
    (
        "canon-confidence",
        "No retrieved claim is ever certain; every confidence value stays below 1.0.",
        0.9,
    ),
    (
        "canon-sift",
        "Before relying on a contested claim: stop, investigate the source, find better coverage, trace the claim to its origin.",
        0.85,
    ),
    (
        "canon-precedence",
        "When sources disagree, canon outranks project files, project files outrank connected knowledge, and connected knowledge outranks the web.",
        0.85,
    ),
    (
        "canon-conflicts",
        "Disagreements that cannot be settled are shown to the user with every position intact.",
        0.8,
    ),
];

/// `(source, target, weight)`, all `supports`.
const CANON_EDGES: &[(&str, &str, f64)] = &[
    ("canon-identity", "canon-honesty", 0.7),
    ("canon-honesty", "canon-confidence", 0.9),
    ("canon-honesty", "canon-conflicts", 0.8),
    ("canon-sift", "canon-precedence", 0.8),
    ("canon-sift", "canon-conflicts", 0.6),
];

/// What a seeding run changed.
#[derive(Debug, Default, Serialize)]
pub struct SeedReport {
    pub nodes_inserted: usize,
    pub nodes_rewritten: usize,
    pub edges_inserted: usize,
    pub revision: u32,
}

/// The canon nodes, in seeding order.
pub fn canon_nodes() -> Vec<MemoryNode> {
    CANON_STATEMENTS
        .iter()
        .map(|(id, content, resonance)| {
            MemoryNode::new(*id, Layer::Core, NodeKind::CanonStatement, *content)
                .with_resonance(*resonance)
                .with_created_at(CANON_CREATED_AT)
        })
        .collect()
}

/// Insert any missing canon nodes and edges. With `force`, existing canon
/// nodes whose content differs are rewritten.
pub fn seed_canon(conn: &mut Connection, force: bool) -> MemoryResult<SeedReport> {
    let mut report = SeedReport {
        revision: CANON_REVISION,
        ..SeedReport::default()
    };

    for node in canon_nodes() {
        if store::put_core_node(conn, &node)? {
            report.nodes_inserted += 1;
            continue;
        }
        if force {
            let existing = store::get_node(conn, &node.id)?;
            if existing.content != node.content || existing.resonance_score != node.resonance_score {
                store::replace_core_node(conn, &node)?;
                report.nodes_rewritten += 1;
            }
        }
    }

    for (source, target, weight) in CANON_EDGES {
        if store::find_edge(conn, source, target, EdgeType::Supports)?.is_some() {
            continue;
        }
        let edge = MemoryEdge::new(*source, *target, EdgeType::Supports, *weight)
            .with_id(format!("edge-{source}-{target}"));
        store::put_edge(conn, &edge)?;
        report.edges_inserted += 1;
    }

    let previous = migrations::get_canon_revision(conn)?;
    if previous != Some(CANON_REVISION) {
        migrations::set_canon_revision(conn, CANON_REVISION)?;
        tracing::info!(from = ?previous, to = CANON_REVISION, "canon revision recorded");
    }

    if report.nodes_inserted + report.nodes_rewritten + report.edges_inserted > 0 {
        tracing::info!(
            nodes_inserted = report.nodes_inserted,
            nodes_rewritten = report.nodes_rewritten,
            edges_inserted = report.edges_inserted,
            "canon seeded"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn seeding_is_idempotent() {
        let mut conn = db::open_memory_database().unwrap();
        let first = seed_canon(&mut conn, false).unwrap();
        assert_eq!(first.nodes_inserted, CANON_STATEMENTS.len());
        assert_eq!(first.edges_inserted, CANON_EDGES.len());

        let second = seed_canon(&mut conn, false).unwrap();
        assert_eq!(second.nodes_inserted, 0);
        assert_eq!(second.edges_inserted, 0);
        assert_eq!(
            migrations::get_canon_revision(&conn).unwrap(),
            Some(CANON_REVISION)
        );
    }

    #[test]
    fn canon_nodes_are_core_and_scored() {
        for node in canon_nodes() {
            assert_eq!(node.layer, Layer::Core);
            let score = node.resonance_score.unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn force_restores_altered_canon() {
        let mut conn = db::open_memory_database().unwrap();
        seed_canon(&mut conn, false).unwrap();

        let mut altered = store::get_node(&conn, "canon-honesty").unwrap();
        altered.content = "tampered".into();
        store::replace_core_node(&mut conn, &altered).unwrap();

        let report = seed_canon(&mut conn, true).unwrap();
        assert_eq!(report.nodes_rewritten, 1);
        let restored = store::get_node(&conn, "canon-honesty").unwrap();
        assert!(restored.content.starts_with("Ember never presents"));
    }
}
