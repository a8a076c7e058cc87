//! nextgamf AMF
//!
//! This is the main binary for the 5G AMF signaling engine. It implements:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - UE context restore from the state store
//! - Task spawning and lifecycle management
//! - Graceful shutdown handling
//!
//! # Usage
//!
//! ```bash
//! nr-amf -c config/amf.yaml
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use nextgamf_amf::persistence::open_store;
use nextgamf_amf::{AmfApp, LocalServices, RanDownlink, StartOptions};
use nextgamf_common::{init_logging, AmfConfig, LogLevel};

/// nextgamf AMF - 5G Access and Mobility Management Function
#[derive(Parser, Debug)]
#[command(name = "nr-amf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the AMF configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level, overriding the configuration file
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Start with an empty context store instead of restoring snapshots
    #[arg(long = "no-restore")]
    no_restore: bool,
}

fn load_config(path: &str) -> Result<AmfConfig> {
    let config = AmfConfig::from_yaml_file(path).with_context(|| format!("Failed to load configuration from {path}"))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {path}"))?;
    Ok(config)
}

/// Drains downlinks while no NGAP transport is attached.
async fn radio_sink(mut radio_rx: mpsc::Receiver<RanDownlink>) {
    let mut dropped = 0u64;
    while let Some(message) = radio_rx.recv().await {
        dropped += 1;
        debug!("No radio node attached, dropping {}", message.name());
    }
    if dropped > 0 {
        warn!("{} downlink messages had no radio node to go to", dropped);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            init_logging(LogLevel::Info);
            error!("AMF failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let level = match args.log_level {
        Some(level) => level,
        None => config.log_level.parse().unwrap_or_default(),
    };
    init_logging(level);

    println!("nextgamf AMF - 5G Access and Mobility Management Function");
    println!("=========================================================");

    match run_amf(config, !args.no_restore).await {
        Ok(()) => {
            info!("AMF exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("AMF failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main AMF execution logic
async fn run_amf(config: AmfConfig, restore: bool) -> Result<()> {
    info!(
        "Configuration loaded: PLMN={}, AMF set {}, {} TAI(s), default DNN {}",
        config.guami.plmn,
        config.guami.amf_set_id,
        config.tai_list.len(),
        config.default_dnn
    );
    let collaborators =
        LocalServices::from_config(&config.local_services).context("Failed to set up local collaborators")?;
    let state = open_store(&config.persistence).context("Failed to open the state store")?;

    let (radio_tx, radio_rx) = mpsc::channel(config.channel_capacity);
    tokio::spawn(radio_sink(radio_rx));

    let app = AmfApp::start(config, collaborators, state, radio_tx, StartOptions { restore })
        .await
        .context("Failed to restore UE contexts")?;

    info!("AMF started, waiting for shutdown signal...");
    signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating shutdown...");

    app.flush().await;
    match app.shutdown().await {
        Ok(()) => info!("All tasks shut down successfully"),
        // Still exit cleanly since we're shutting down anyway
        Err(e) => warn!("Some tasks failed during shutdown: {}", e),
    }
    Ok(())
}
