//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that open the
//! database, seed canon, wire the source registry and start the MCP tool
//! handler.

use crate::config::EmberConfig;
use crate::engine::MemoryEngine;
use crate::tools::EmberTools;
use anyhow::Result;
use rmcp::ServiceExt;

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: EmberConfig) -> Result<()> {
    tracing::info!("starting Ember MCP server on stdio");

    let engine = MemoryEngine::open(config)?;
    log_registry(&engine);

    let tools = EmberTools::new(engine);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP, mounted at `/mcp`.
pub async fn serve_http(config: EmberConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting Ember MCP server on HTTP");

    let engine = MemoryEngine::open(config)?;
    log_registry(&engine);

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(EmberTools::new(engine.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}

fn log_registry(engine: &MemoryEngine) {
    let categories: Vec<String> = engine
        .orchestrator()
        .registry()
        .categories()
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    tracing::info!(sources = ?categories, "source registry ready");
}
