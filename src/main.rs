//! cdcroute - offline replay of CDC journal events
//!
//! # Usage
//!
//! ```bash
//! # Check a configuration file
//! cdcroute validate --config sink.yaml
//!
//! # Replay events through the pipeline against an in-memory sink
//! cdcroute replay --config sink.yaml --events events.jsonl --batch-size 500
//! ```
//!
//! Committed and quarantined rows are printed to stdout as JSON lines; logs go
//! to stderr. `RUST_LOG` controls the log filter.
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cdcroute::{MemoryWriteLayer, Pipeline, SinkConfig, read_events};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdcroute")]
#[command(version, about = "Classify and route CDC journal events into per-table batches")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay a JSON-lines event file through the pipeline
    Replay {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// JSON-lines event file
        #[arg(short, long)]
        events: PathBuf,

        /// Events per unit of work
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            info!(
                name = config.name.as_deref().unwrap_or("unnamed"),
                tolerance = %config.errors.tolerance,
                "config_valid"
            );
            Ok(())
        }
        Commands::Replay {
            config,
            events,
            batch_size,
        } => replay(&config, &events, batch_size),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> Result<SinkConfig> {
    let mut config = SinkConfig::from_file(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    Ok(config)
}

fn replay(config_path: &Path, events_path: &Path, batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let config = load_config(config_path)?;
    let file = File::open(events_path)
        .with_context(|| format!("opening events {}", events_path.display()))?;
    let events = read_events(BufReader::new(file))?;

    let mut pipeline = Pipeline::from_config(&config, MemoryWriteLayer::new())?;
    let mut failure = None;
    for (index, batch) in events.chunks(batch_size).enumerate() {
        if let Err(err) = pipeline.process_batch(batch) {
            failure = Some((index, err));
            break;
        }
    }

    let sink = pipeline.into_writer();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (table, records) in sink.committed_tables() {
        for record in records {
            writeln!(out, "{}", json!({ "table": table, "record": record }))?;
        }
    }
    for (table, rows) in sink.quarantine_tables() {
        for row in rows {
            writeln!(out, "{}", json!({ "quarantine": table, "row": row }))?;
        }
    }
    out.flush()?;

    match failure {
        Some((index, err)) => Err(err).with_context(|| format!("batch {index} failed")),
        None => Ok(()),
    }
}
