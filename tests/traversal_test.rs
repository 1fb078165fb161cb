mod helpers;

use ember::memory::traversal::{find_resonant, get_with_edges, traverse};
use ember::memory::types::{EdgeType, Layer, NodeKind};
use helpers::{insert_node, link, test_db};
use rusqlite::Connection;
use std::collections::HashSet;

fn archive(conn: &mut Connection, id: &str) {
    insert_node(conn, id, Layer::Archive, NodeKind::Event, &format!("event {id}"), None);
}

#[test]
fn core_to_archive_walk() {
    let mut conn = test_db();
    insert_node(&mut conn, "A", Layer::Core, NodeKind::CanonStatement, "Anchor", Some(0.9));
    archive(&mut conn, "B");
    link(&mut conn, "A", "B", EdgeType::Supports, 0.8);

    let steps = traverse(&conn, "A", 1, 0.3).unwrap();
    let got: Vec<(&str, u32, Vec<&str>)> = steps
        .iter()
        .map(|s| (s.node_id.as_str(), s.depth, s.path.iter().map(String::as_str).collect()))
        .collect();
    assert_eq!(got, vec![("A", 0, vec!["A"]), ("B", 1, vec!["A", "B"])]);
}

/// a → b → c → a plus a → c, with a weak c → d.
fn cyclic_graph() -> Connection {
    let mut conn = test_db();
    for id in ["a", "b", "c", "d"] {
        archive(&mut conn, id);
    }
    link(&mut conn, "a", "b", EdgeType::Causal, 0.9);
    link(&mut conn, "b", "c", EdgeType::Causal, 0.9);
    link(&mut conn, "c", "a", EdgeType::Causal, 0.9);
    link(&mut conn, "a", "c", EdgeType::Similarity, 0.5);
    link(&mut conn, "c", "d", EdgeType::Resonance, 0.1);
    conn
}

#[test]
fn repeated_calls_return_identical_results() {
    let conn = cyclic_graph();
    let first = traverse(&conn, "a", 4, 0.3).unwrap();
    for _ in 0..5 {
        assert_eq!(traverse(&conn, "a", 4, 0.3).unwrap(), first);
    }
}

#[test]
fn paths_never_repeat_a_node() {
    let conn = cyclic_graph();
    for depth in 0..=6 {
        for step in traverse(&conn, "a", depth, 0.0).unwrap() {
            let unique: HashSet<&String> = step.path.iter().collect();
            assert_eq!(unique.len(), step.path.len(), "cycle in {:?}", step.path);
            assert_eq!(step.path.len() as u32, step.depth + 1);
            assert_eq!(step.path.last(), Some(&step.node_id));
        }
    }
}

#[test]
fn edges_below_threshold_are_not_followed() {
    let conn = cyclic_graph();
    let steps = traverse(&conn, "a", 5, 0.3).unwrap();
    assert!(steps.iter().all(|s| s.node_id != "d"));

    // Removing the sub-threshold edge changes nothing
    let pruned = cyclic_graph();
    pruned
        .execute("DELETE FROM memory_edges WHERE weight < 0.3", [])
        .unwrap();
    assert_eq!(traverse(&pruned, "a", 5, 0.3).unwrap(), steps);

    let with_weak = traverse(&conn, "a", 5, 0.0).unwrap();
    assert!(with_weak.iter().any(|s| s.node_id == "d"));
}

#[test]
fn max_depth_zero_returns_only_start() {
    let conn = cyclic_graph();
    let steps = traverse(&conn, "a", 0, 0.3).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].node_id, "a");
}

#[test]
fn top_resonant_nodes_in_descending_order() {
    let mut conn = test_db();
    let scores = [0.9, 0.8, 0.7, 0.6, 0.55, 0.5, 0.4, 0.3, 0.2, 0.1];
    for (i, score) in scores.iter().enumerate() {
        insert_node(
            &mut conn,
            &format!("n{i}"),
            Layer::Archive,
            NodeKind::Insight,
            &format!("insight {i}"),
            Some(*score),
        );
    }

    let top = find_resonant(&conn, 0.5, 5).unwrap();
    let got: Vec<f64> = top.iter().filter_map(|n| n.resonance_score).collect();
    assert_eq!(got, vec![0.9, 0.8, 0.7, 0.6, 0.55]);

    let all = find_resonant(&conn, 0.5, 100).unwrap();
    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|n| n.resonance_score.unwrap() >= 0.5));
}

#[test]
fn node_with_edges_lists_both_directions() {
    let conn = cyclic_graph();
    let detail = get_with_edges(&conn, "c").unwrap();
    assert_eq!(detail.node.id, "c");
    let outgoing: Vec<&str> = detail.outgoing.iter().map(|e| e.target.as_str()).collect();
    assert_eq!(outgoing, vec!["a", "d"]);
    let incoming: Vec<&str> = detail.incoming.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(incoming, vec!["a", "b"]);
}
