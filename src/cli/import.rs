use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use ember::config::EmberConfig;
use ember::memory::store;
use ember::memory::types::Layer;

use super::GraphDump;

/// Import nodes and edges from a JSON file produced by `ember export`.
///
/// Nodes whose ID already exists are skipped. Core nodes go through the
/// insert-if-absent canon path. Edges are re-created when both endpoints
/// exist and the (source, target, type) triple is not already present.
pub fn import(config: &EmberConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: GraphDump = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let db_path = config.resolved_db_path();
    let mut conn = ember::db::open_database(&db_path)?;

    println!(
        "Importing {} nodes and {} edges...",
        data.nodes.len(),
        data.edges.len()
    );

    let pb = ProgressBar::new((data.nodes.len() + data.edges.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let mut imported = 0u64;
    let mut skipped = 0u64;

    pb.set_message("nodes");
    for node in &data.nodes {
        pb.inc(1);
        let inserted = if node.layer == Layer::Core {
            store::put_core_node(&mut conn, node)?
        } else if store::node_exists(&conn, &node.id)? {
            false
        } else {
            store::put_node(&mut conn, node)?;
            true
        };
        if inserted {
            imported += 1;
        } else {
            skipped += 1;
        }
    }

    let mut edges_created = 0u64;
    let mut edges_skipped = 0u64;

    pb.set_message("edges");
    for edge in &data.edges {
        pb.inc(1);
        let endpoints = store::node_exists(&conn, &edge.source)? && store::node_exists(&conn, &edge.target)?;
        let duplicate = store::find_edge(&conn, &edge.source, &edge.target, edge.edge_type)?.is_some();
        if !endpoints || duplicate {
            edges_skipped += 1;
            continue;
        }
        match store::put_edge(&mut conn, edge) {
            Ok(()) => edges_created += 1,
            Err(e) => {
                tracing::warn!(edge = %edge.id, error = %e, "edge import failed");
                edges_skipped += 1;
            }
        }
    }
    pb.finish_and_clear();

    println!("Import complete:");
    println!("  Nodes imported:    {imported}");
    println!("  Nodes skipped:     {skipped} (already exist)");
    println!("  Edges created:     {edges_created}");
    if edges_skipped > 0 {
        println!("  Edges skipped:     {edges_skipped}");
    }

    Ok(())
}
