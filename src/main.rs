//! Pattern Warden MCP Server
//!
//! Validates code against a project's ast-grep rules and manages those rules
//! over the Model Context Protocol.

use clap::Parser;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pattern_warden::config::{Args, Config, Transport};
use pattern_warden::error::{Error, Result};
use pattern_warden::mcp::handler::McpHandler;
use pattern_warden::mcp::server::McpServer;
use pattern_warden::mcp::transport::StdioTransport;
use pattern_warden::metrics::Metrics;
use pattern_warden::service::Services;
use pattern_warden::tools;
use pattern_warden::VERSION;

fn init_logging(config: &Config) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    // RUST_LOG wins over --debug when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder().with_env_filter(filter);
    let installed = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing::subscriber::set_global_default(
                builder.with_ansi(false).with_writer(Mutex::new(file)).finish(),
            )
        }
        // Stdout carries the protocol stream.
        None => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).finish(),
        ),
    };

    installed.map_err(|e| Error::Internal(format!("failed to set tracing subscriber: {}", e)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config: Config = args.into();
    init_logging(&config)?;

    info!("Pattern Warden MCP Server v{}", VERSION);
    info!("Project root override: {:?}", config.project_root);
    info!("Transport: {:?}", config.transport);

    let metrics = Metrics::new();
    let services = Services::from_config(&config, metrics.clone())?;

    let mut handler = McpHandler::new();
    tools::register_all_tools(&mut handler, &services);
    info!("Registered {} MCP tools", handler.tool_count());
    let handler = Arc::new(handler);

    match config.transport {
        Transport::Stdio => {
            info!("Starting stdio transport...");
            let server = McpServer::new(handler, metrics, "pattern-warden");
            server.run(StdioTransport::new()).await?;
        }
        Transport::Http => {
            info!("Starting HTTP transport on port {}...", config.port);
            pattern_warden::http::start_server(&config, handler, metrics).await?;
        }
    }

    Ok(())
}
