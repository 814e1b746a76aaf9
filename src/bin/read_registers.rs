// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! One-shot register dump: connects to the inverter, reads and decodes every
//! register of the map and prints the values in map order.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use rust_inverter_monitor::acquisition::SampleAcquirer;
use rust_inverter_monitor::config::{Config, FailurePolicy};
use rust_inverter_monitor::modbus::{RegisterTransport, TcpRegisterTransport};
use rust_inverter_monitor::register_map::RegisterMap;

/// Read and decode the input registers of a solar inverter
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Configuration file providing the connection settings
    #[clap(long)]
    config: Option<PathBuf>,

    /// Inverter address, overrides the configuration
    #[clap(long)]
    address: Option<String>,

    /// Inverter Modbus TCP port, overrides the configuration
    #[clap(long)]
    port: Option<u16>,

    /// Built-in register map, overrides the configuration
    #[clap(long)]
    model: Option<String>,

    /// YAML register map, overrides the model
    #[clap(long)]
    register_map: Option<PathBuf>,

    /// Timeout for each request in seconds
    #[clap(long, default_value = "3")]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    // Parse command line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_args(args.address, args.port, args.model, None, None, true);

    let map = match &args.register_map {
        Some(path) => RegisterMap::from_file(path)?,
        None => config.register_map()?,
    };

    println!(
        "Connecting to inverter at {}:{}",
        config.inverter.address, config.inverter.port
    );
    let mut transport = TcpRegisterTransport::from_config(&config.inverter)
        .with_timeout(Duration::from_secs(args.timeout.max(1)));

    println!("Reading {} registers", map.len());
    let result = SampleAcquirer::new(FailurePolicy::SkipRegister)
        .acquire(&mut transport, &map.registers)
        .await;
    transport.close().await;
    let snapshot = result?;

    for spec in &map.registers {
        if let Some(value) = snapshot.get(&spec.name) {
            println!("{} = {}", spec.name, value);
        }
    }

    Ok(())
}
