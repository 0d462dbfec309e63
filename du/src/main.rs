//! Albor DU Control Path Simulator
//!
//! Runs the PUCCH resource pools and the UCI decoders of the configured cells
//! against a synthetic UE population.

mod config;
mod simulator;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::DuAppConfig;
use simulator::Simulator;

/// Albor DU control path simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML or TOML), built-in defaults if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Number of UEs admitted at start-up, overrides the configuration file
    #[arg(long)]
    nof_ues: Option<u16>,

    /// Number of slots to simulate
    #[arg(long, default_value = "20480")]
    nof_slots: u64,

    /// Pace the slot loop to the slot duration
    #[arg(long)]
    realtime: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Albor DU simulator");

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            DuAppConfig::from_file(path)?
        }
        None => {
            info!("Using built-in configuration");
            DuAppConfig::default()
        }
    };
    if let Some(nof_ues) = args.nof_ues {
        config.ue.nof_ues = nof_ues;
    }

    info!("Cell configuration:");
    info!("  Subcarrier spacing: {} kHz", config.common_scs);
    info!("  Cells: {}", config.cells.len());
    info!("  Max PUCCH grants per slot: {}", config.max_pucch_grants_per_slot);
    info!("  UEs: {}", config.ue.nof_ues);

    let mut sim = Simulator::new(&config)?;

    tokio::select! {
        _ = sim.run(args.nof_slots, args.realtime) => {
            info!("Simulation finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    let summary = sim.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.log();
    }
    Ok(())
}
