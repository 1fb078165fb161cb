use anyhow::Result;

use ember::config::EmberConfig;
use ember::memory::types::{EdgeType, Layer, NodeKind};

use super::doctor::format_bytes;
use super::inspect::format_millis;

/// Display graph statistics in the terminal.
pub fn stats(config: &EmberConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = ember::db::open_database(&db_path)?;

    let response = ember::memory::stats::graph_stats(&conn, Some(db_path.as_path()))?;

    println!("Graph Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total nodes:         {}", response.total_nodes);
    println!("  Total edges:         {}", response.total_edges);
    println!();

    println!("By Layer:");
    for layer in [Layer::Core, Layer::Archive, Layer::Shadow] {
        let count = response.by_layer.get(layer.as_str()).copied().unwrap_or(0);
        println!("  {:<16} {}", layer.as_str(), count);
    }
    println!();

    println!("By Kind:");
    for kind in NodeKind::ALL {
        let count = response.by_kind.get(kind.as_str()).copied().unwrap_or(0);
        println!("  {:<16} {}", kind.as_str(), count);
    }
    println!();

    println!("By Edge Type:");
    for edge_type in EdgeType::ALL {
        let count = response.by_edge_type.get(edge_type.as_str()).copied().unwrap_or(0);
        println!("  {:<16} {}", edge_type.as_str(), count);
    }
    println!();

    println!("Database size:         {}", format_bytes(response.db_size_bytes));
    if let Some(oldest) = response.oldest_node {
        println!("Oldest node:           {}", format_millis(oldest));
    }
    if let Some(newest) = response.newest_node {
        println!("Newest node:           {}", format_millis(newest));
    }

    Ok(())
}
