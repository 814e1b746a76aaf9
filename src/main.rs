// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the inverter monitor daemon
use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tokio::signal;

use rust_inverter_monitor::config::{self, Config};
use rust_inverter_monitor::daemon::Daemon;

/// Solar inverter monitor reporting Modbus telemetry to PVOutput
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Inverter address (IP or hostname)
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// Inverter Modbus TCP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Inverter model selecting a built-in register map
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    scan_interval: Option<u64>,

    /// Upload window in minutes
    #[arg(long)]
    upload_interval: Option<u64>,

    /// Compute and log reports without sending them
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger with appropriate level based on verbose and quiet flags
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    // Apply command line overrides
    config.apply_args(
        args.address.clone(),
        args.port,
        args.model.clone(),
        args.scan_interval,
        args.upload_interval,
        args.dry_run,
    );
    config.validate()?;

    info!("Load config {}", config.inverter.model);
    info!("Timezone is {}", config.acquisition.timezone);
    info!(
        "The current time is {}",
        chrono::Utc::now()
            .with_timezone(&config.timezone()?)
            .format("%Y-%m-%d %H:%M:%S")
    );

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating daemon");
        }
        Err(err) => {
            error!("Error waiting for shutdown signal: {}", err);
        }
    }
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
