mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ember::config::EmberConfig;

#[derive(Parser)]
#[command(name = "ember", version, about = "Companion memory core with source-aware verification")]
struct Cli {
    /// Config file (defaults to ~/.ember/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http)
    Serve {
        /// Serve Streamable HTTP on the configured host and port
        #[arg(long)]
        http: bool,
    },
    /// Install the canon, or restore it with --force
    Seed {
        #[arg(long)]
        force: bool,
    },
    /// Run a query and print annotated evidence
    Query {
        text: String,
        /// Passages requested per source
        #[arg(long)]
        max_memories: Option<usize>,
        /// Report conflicts without verification re-queries
        #[arg(long)]
        no_requery: bool,
        /// Wall-clock budget in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Warn when external evidence never reaches an original source
        #[arg(long)]
        require_original: bool,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Walk outgoing edges from a node
    Traverse {
        start_id: String,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long)]
        min_weight: Option<f64>,
    },
    /// Show a node and its edges
    Inspect { id: String },
    /// Import nodes and edges from an export file
    Import { file: PathBuf },
    /// Export all nodes and edges as JSON to stdout
    Export,
    /// Check database health
    Doctor,
    /// Show graph statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EmberConfig::load_from(path)?,
        None => EmberConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                ember::server::serve_http(config).await?;
            } else {
                ember::server::serve_stdio(config).await?;
            }
        }
        Command::Seed { force } => cli::seed::seed(&config, force)?,
        Command::Query {
            text,
            max_memories,
            no_requery,
            deadline_ms,
            require_original,
            json,
        } => {
            cli::query::query(
                config,
                cli::query::QueryArgs {
                    text,
                    max_memories,
                    no_requery,
                    deadline_ms,
                    require_original,
                    json,
                },
            )
            .await?
        }
        Command::Traverse {
            start_id,
            max_depth,
            min_weight,
        } => cli::traverse::traverse(&config, &start_id, max_depth, min_weight)?,
        Command::Inspect { id } => cli::inspect::inspect(&config, &id)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Export => cli::export::export(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
