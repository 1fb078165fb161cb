use anyhow::Result;

use ember::config::EmberConfig;
use ember::memory::store;
use ember::memory::types::NodeFilter;

use super::GraphDump;

/// Export every node and edge as JSON to stdout.
pub fn export(config: &EmberConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = ember::db::open_database(&db_path)?;

    let mut nodes = store::list_nodes(&conn, &NodeFilter::default())?;
    nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let edges = store::list_edges(&conn)?;

    let data = GraphDump { nodes, edges };
    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} nodes and {} edges.",
        data.nodes.len(),
        data.edges.len()
    );

    Ok(())
}
