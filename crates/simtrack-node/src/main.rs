//! SimTrack node
//!
//! Offline harness for the SIMTRACK SEI metadata path.
//!
//! - `inject` splices tracking records into the keyframes of an Annex B
//!   elementary stream, as the live sender does after the encoder
//! - `extract` recovers records from a captured stream and reports receive
//!   statistics, as the live receiver does before the decoder

mod access_unit;
mod receiver;
mod sender;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simtrack_sei::config::SimtrackConfig;
use tracing_subscriber::EnvFilter;

/// SIMTRACK SEI metadata injector and extractor.
#[derive(Parser, Debug)]
#[command(name = "simtrack-node", about = "SIMTRACK SEI metadata injector and extractor")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true, env = "SIMTRACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Splice tracking records into the keyframes of an elementary stream.
    Inject(sender::InjectArgs),
    /// Extract tracking records from a captured stream.
    Extract(receiver::ExtractArgs),
}

fn load_config(path: Option<&Path>) -> Result<SimtrackConfig> {
    let Some(path) = path else {
        return Ok(SimtrackConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    SimtrackConfig::from_toml_str(&text)
        .with_context(|| format!("loading config {}", path.display()))
}

fn main() -> Result<()> {
    // Records go to stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Inject(args) => sender::run(args, &config),
        Command::Extract(args) => receiver::run(args, &config),
    }
}
