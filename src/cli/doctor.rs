//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use ember::config::EmberConfig;
use ember::db;
use ember::seed::CANON_REVISION;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &EmberConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `ember seed` or `ember serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Ember Health Report");
    println!("===================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Canon:");
    match report.canon_revision {
        Some(rev) if rev == CANON_REVISION => println!("  Revision:        {rev} (current)"),
        Some(rev) => {
            println!("  Revision:        {rev} (binary ships {CANON_REVISION})");
            println!("  WARNING: canon is stale. Run `ember seed --force` to update it.");
        }
        None => println!("  Revision:        (not seeded) Run `ember seed`."),
    }
    println!("  Core nodes:      {}", report.core_node_count);
    println!();
    println!("Row counts:");
    println!("  Nodes:           {}", report.node_count);
    println!("  Edges:           {}", report.edge_count);
    println!("  Audit log:       {}", report.log_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.ember/memory.db");
        println!("  2. Or export from a good copy and reimport:");
        println!("     ember export > backup.json");
        println!("     ember import backup.json");
    }

    Ok(())
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
