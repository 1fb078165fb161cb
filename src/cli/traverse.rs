use anyhow::Result;

use ember::config::EmberConfig;
use ember::memory::{store, traversal};

/// Print a breadth-first walk from `start_id`, one line per reachable node.
pub fn traverse(
    config: &EmberConfig,
    start_id: &str,
    max_depth: Option<u32>,
    min_weight: Option<f64>,
) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = ember::db::open_database(&db_path)?;

    let max_depth = max_depth.unwrap_or(config.retrieval.traverse_max_depth);
    let min_weight = min_weight.unwrap_or(config.retrieval.traverse_min_weight);
    let steps = traversal::traverse(&conn, start_id, max_depth, min_weight)?;

    if steps.is_empty() {
        println!("No nodes reachable from {start_id} (depth {max_depth}, min weight {min_weight:.2}).");
        return Ok(());
    }

    for step in &steps {
        let node = store::get_node(&conn, &step.node_id)?;
        println!(
            "{}{} [{}/{}] {}",
            "  ".repeat(step.depth as usize),
            step.node_id,
            node.layer,
            node.kind,
            ember::text::truncate(&node.content, 72),
        );
    }
    println!();
    println!("{} nodes within depth {max_depth}.", steps.len());
    Ok(())
}
