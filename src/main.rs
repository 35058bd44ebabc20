use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee::commands;
use marquee::config::Config;

#[derive(Parser)]
#[command(
    name = "marquee",
    version,
    about = "Movie showtime aggregation coordinator with lease-based concurrency control",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Path to a TOML config file (environment variables otherwise)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh one location with interactive priority
    Demand {
        /// Location as "City, Country" or "City, Region, Country"
        location: String,

        /// External acquirer command (or MARQUEE_ACQUIRER_CMD)
        #[arg(long)]
        acquirer: Option<String>,
    },

    /// Run one shard worker cycle over its subset of the catalog
    Worker {
        /// Shard id in [0, shards)
        #[arg(long)]
        shard_id: u32,

        /// Total number of shards (defaults to configuration)
        #[arg(long)]
        shards: Option<u32>,

        /// External acquirer command (or MARQUEE_ACQUIRER_CMD)
        #[arg(long)]
        acquirer: Option<String>,
    },

    /// Refresh the full catalog once (scheduled path)
    Refresh {
        /// External acquirer command (or MARQUEE_ACQUIRER_CMD)
        #[arg(long)]
        acquirer: Option<String>,
    },

    /// Show lease, refresh and coverage state for a location
    Status {
        /// Location as "City, Country" or "City, Region, Country"
        location: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(std::path::Path::new(path))?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Demand { location, acquirer } => {
            tracing::info!(location = %location, "Starting demand command");
            commands::demand(location, acquirer, config).await?;
        }

        Commands::Worker {
            shard_id,
            shards,
            acquirer,
        } => {
            tracing::info!(
                shard_id = %shard_id,
                shards = ?shards,
                "Starting worker command"
            );
            commands::worker(shard_id, shards, acquirer, config).await?;
        }

        Commands::Refresh { acquirer } => {
            tracing::info!("Starting refresh command");
            commands::refresh(acquirer, config).await?;
        }

        Commands::Status { location } => {
            tracing::info!(location = %location, "Starting status command");
            commands::status(location, config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("marquee=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("marquee=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
