//! CLI `inspect` command: display a node with its edges.

use anyhow::Result;

use ember::config::EmberConfig;
use ember::memory::traversal;

/// Inspect a single node by ID and display full details.
pub fn inspect(config: &EmberConfig, id: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = ember::db::open_database(&db_path)?;

    let detail = traversal::get_with_edges(&conn, id)?;

    let n = &detail.node;
    println!("Node: {}", n.id);
    println!("{}", "=".repeat(50));
    println!("  Layer:          {}", n.layer);
    println!("  Kind:           {}", n.kind);
    if let Some(score) = n.resonance_score {
        println!("  Resonance:      {score:.2}");
    }
    if let Some(ref owner) = n.owner_scope {
        println!("  Owner:          {owner}");
    }
    println!("  Created:        {}", format_millis(n.created_at));
    if let Some(ref snapshot) = n.metrics_snapshot {
        println!("  Metrics:        {}", serde_json::to_string_pretty(snapshot)?);
    }
    println!();
    println!("Content:");
    println!("  {}", n.content);

    if !detail.outgoing.is_empty() {
        println!();
        println!("Outgoing:");
        for e in &detail.outgoing {
            println!("  --[{} {:.2}]--> {}", e.edge_type, e.weight, e.target);
        }
    }
    if !detail.incoming.is_empty() {
        println!();
        println!("Incoming:");
        for e in &detail.incoming {
            println!("  {} --[{} {:.2}]-->", e.source, e.edge_type, e.weight);
        }
    }

    Ok(())
}

pub(crate) fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}
