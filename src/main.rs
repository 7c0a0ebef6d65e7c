//! Storage Manager - per-trading-system artifact storage
//!
//! Keeps artifact directories in step with the trading-system inventory and
//! serves documentation and equity charts over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storage_manager::{
    config::StorageManagerConfig,
    gateway::GatewayBuilder,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "storage-manager")]
#[command(version)]
#[command(about = "Per-trading-system artifact storage")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STORAGE_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the storage gateway and lifecycle listener
    Serve {
        /// Host to bind to (overrides the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let config = match &cli.config {
        Some(path) => StorageManagerConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => StorageManagerConfig::default(),
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_gateway(config, host, port).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("storage_manager={},tower_http={}", log_level, log_level).into()
    });

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run_gateway(
    config: StorageManagerConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut builder = GatewayBuilder::new().config(config);
    if let Some(host) = host {
        builder = builder.host(host);
    }
    if let Some(port) = port {
        builder = builder.port(port);
    }

    let gateway = builder
        .build()
        .context("Failed to initialize artifact storage")?;

    gateway
        .start()
        .await
        .context("Failed to start storage gateway")?;

    tracing::info!("Storage Manager is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    gateway.stop().await?;

    Ok(())
}

fn show_config(config: Option<&StorageManagerConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
