//! Beacon - event ingestion server and sender
//!
//! # Usage
//!
//! ```bash
//! # Run the ingestion server
//! beacon serve
//! beacon --config beacon.toml serve --port 9000
//!
//! # Queue one event, flushing once the batch size is reached
//! beacon send --json '{"EventName":"signup","user":"ada"}'
//!
//! # Deliver immediately, bypassing the queue
//! beacon send --now --json '{"EventName":"signup","user":"ada"}'
//! ```

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use beacon_config::{Config, LogConfig, LogFormat, LogOutput};
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Beacon - event ingestion server and sender
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive, overrides [log] level
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion server
    Serve(cmd::serve::ServeArgs),

    /// Send one event through the offline queue or immediately
    Send(cmd::send::SendArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    init_logging(cli.log_level.as_deref(), &config.log)?;

    match cli.command {
        Command::Serve(args) => cmd::serve::run(args, config).await,
        Command::Send(args) => cmd::send::run(args, config).await,
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level_override: Option<&str>, log: &LogConfig) -> Result<()> {
    let level = level_override.unwrap_or(log.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = match log.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    };

    let layer = match log.format {
        LogFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(())
}
