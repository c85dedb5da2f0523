//! covidtrack - daily confirmed/deaths/recovered time series, reconciled
//! per location and cached locally.

mod commands;
mod format;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use covidtrack_core::{Config, MetricKind, Tracker};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "covidtrack", version, about = "Track daily case counts per location")]
struct Cli {
    /// Config file (defaults to ~/.config/covidtrack/config.json)
    #[arg(long, env = "COVIDTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the location snapshot
    #[arg(long, env = "COVIDTRACK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Hours after which stored data is considered stale
    #[arg(long, env = "COVIDTRACK_STALE_AFTER_HOURS")]
    stale_after_hours: Option<i64>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "COVIDTRACK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch all feeds now and reconcile them into the store
    Refresh,
    /// Show stored records; refreshes in the background when stale
    Show {
        /// Sort by one metric (infected, dead, recovered) instead of the overview
        metric: Option<MetricKind>,
        /// Only print this many rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show when each feed was last ingested
    Status,
    /// Run scheduled refreshes until interrupted
    Serve,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "covidtrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(hours) = cli.stale_after_hours {
        config.stale_after_hours = hours;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_ref());
    info!("covidtrack starting");

    let config = load_config(&cli)?;
    let tracker = Arc::new(Tracker::from_config(&config)?);

    match cli.command {
        Command::Refresh => commands::refresh(&tracker, cli.json).await,
        Command::Show { metric, limit } => commands::show(&tracker, metric, limit, cli.json).await,
        Command::Status => commands::status(&tracker, cli.json).await,
        Command::Serve => commands::serve(tracker, config.schedule()?).await,
    }
}
