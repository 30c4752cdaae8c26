//! CipherWall CLI
//!
//! Command-line interface for the CipherWall encrypted tunnel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cipherwall_engine::{Config, Engine, Role};

/// CipherWall - encrypted point-to-point IP tunnel
#[derive(Parser)]
#[command(name = "cipherwall")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cipherwall.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as tunnel server
    Server,

    /// Run as tunnel client
    Client,

    /// Generate a sample configuration file
    GenConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "cipherwall.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Server => run(cli.config, Role::Server).await,
        Commands::Client => run(cli.config, Role::Client).await,
        Commands::GenConfig { output } => generate_config(output),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config_path: PathBuf, role: Role) -> Result<()> {
    info!("Starting CipherWall {}...", role);

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
    let mut engine =
        Engine::new(config, role).context("Failed to create tunnel engine")?;

    info!("Configuration loaded from {:?}", config_path);

    // Create shutdown handle before moving the engine into a task
    let shutdown_tx = engine.create_shutdown_handle();

    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.start().await {
            error!("Tunnel engine error: {}", e);
        }
    });

    wait_for_shutdown().await;

    info!("Shutting down {}...", role);

    // Signal graceful shutdown and give the engine time to remove routes
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), engine_handle).await;

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<()> {
    let sample = Config::sample();

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!("Sample configuration written to {:?}", output);
    println!("\nEdit the configuration file and set your pre-shared secret before running.");

    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C");
    }
}
