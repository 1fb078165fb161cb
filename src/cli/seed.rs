//! CLI `seed` command: install or restore the canon.

use anyhow::{Context, Result};

use ember::config::EmberConfig;

pub fn seed(config: &EmberConfig, force: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = ember::db::open_database(&db_path)?;

    let report = ember::seed::seed_canon(&mut conn, force).context("canon seeding failed")?;

    println!("Canon revision {} at {}", report.revision, db_path.display());
    println!("  Nodes inserted:    {}", report.nodes_inserted);
    if force {
        println!("  Nodes rewritten:   {}", report.nodes_rewritten);
    }
    println!("  Edges inserted:    {}", report.edges_inserted);
    Ok(())
}
