//! linkrelay Daemon Binary
//!
//! Serves the line protocol and executes commands with the built-in shell.

use std::path::PathBuf;

use clap::Parser;
use linkrelay::config::ConfigBuilder;
use linkrelay::{Config, Endpoint, RelayServer, Shell};
use tracing_subscriber::{fmt, EnvFilter};

/// linkrelay Daemon
#[derive(Parser, Debug)]
#[command(name = "linkrelay-daemon")]
#[command(about = "Accepts download links over a line-oriented TCP protocol")]
#[command(version)]
struct Args {
    /// TOML config file (command-line flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    listen: Option<Endpoint>,

    /// Maximum concurrent connections
    #[arg(short, long)]
    max_connections: Option<usize>,

    /// Time a client gets to send its commands, in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,linkrelay=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("linkrelay daemon v{}", linkrelay::VERSION);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listen address: {}", config.endpoint);

    let server = match RelayServer::bind(config, Shell::new()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    let handle = server.spawn();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");

    if let Err(e) = handle.stop().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Daemon stopped");
}

/// File first, then flags on top
fn build_config(args: &Args) -> linkrelay::Result<Config> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(endpoint) = &args.listen {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(count) = args.max_connections {
        builder = builder.max_connections(count);
    }
    if let Some(ms) = args.read_timeout_ms {
        builder = builder.read_timeout_ms(ms);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}
