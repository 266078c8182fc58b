//! # geomesh
//!
//! CLI for running and inspecting geomesh sessions.
//!
//! ## Commands
//!
//! - `simulate`: Run a local session against simulated peers on an in-memory hub
//! - `config`: Show the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Three peers walking for ten steps
//! geomesh simulate --peers 3 --steps 10
//!
//! # Show what a config file resolves to
//! geomesh config --config geomesh.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod commands;

use commands::settings;
use commands::simulate;

/// CLI for running and inspecting geomesh sessions.
#[derive(Parser, Debug)]
#[command(name = "geomesh")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a local session against simulated peers
    Simulate {
        /// Configuration file (default: ./geomesh.toml if present)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Number of simulated remote peers
        #[arg(long, default_value = "2")]
        peers: usize,

        /// Number of movement steps
        #[arg(long, default_value = "5")]
        steps: usize,
    },

    /// Show the effective configuration
    Config {
        /// Configuration file (default: ./geomesh.toml if present)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            config,
            peers,
            steps,
        } => {
            let config = settings::load(config.as_deref())?;
            simulate::run(&config, peers, steps).await?;
        }
        Commands::Config { config } => {
            settings::show(config.as_deref())?;
        }
    }

    Ok(())
}
