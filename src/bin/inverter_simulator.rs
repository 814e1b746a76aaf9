// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated inverter for bench work
//!
//! Serves the input registers of a register map over Modbus TCP. Generation
//! and string voltages follow a slow oscillation so that the monitor sees
//! changing readings.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use tokio::net::TcpListener;

use rust_inverter_monitor::modbus::{serve_simulator, SimulatedInverter};
use rust_inverter_monitor::register_map::{RegisterMap, RegisterSpec};

/// Modbus TCP server imitating a solar inverter
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listen address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Listen port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Built-in register map to serve
    #[clap(long, default_value = "sg-ktl")]
    model: String,

    /// YAML register map, overrides the model
    #[clap(long)]
    register_map: Option<PathBuf>,

    /// Peak generation in watts
    #[clap(long, default_value = "5000")]
    peak_watts: f64,

    /// Period of the generation oscillation in seconds
    #[clap(long, default_value = "600")]
    period: u64,
}

/// Raw register value for a reading, taking the register scale into account.
fn raw(spec: &RegisterSpec, value: f64) -> i128 {
    (value * 10f64.powi(spec.scale.decimals() as i32)).round() as i128
}

fn update(
    inverter: &SimulatedInverter,
    map: &RegisterMap,
    level: f64,
    peak_watts: f64,
    serial: &str,
) {
    let generation = peak_watts * level;
    for spec in &map.registers {
        if spec.data_type.is_text() {
            inverter.set_text(spec, serial);
            continue;
        }
        let value = if spec.name == map.metrics.generation {
            generation
        } else if spec.name == map.metrics.voltage_1 {
            300.0 + 60.0 * level
        } else if Some(&spec.name) == map.metrics.voltage_2.as_ref() {
            310.0 + 60.0 * level
        } else if Some(&spec.name) == map.metrics.consumption.as_ref() {
            4.2
        } else if Some(&spec.name) == map.metrics.daily_yield.as_ref() {
            12.5
        } else {
            0.0
        };
        inverter.set_integer(spec, raw(spec, value));
    }
    debug!("SIMULATOR: generation set to {:.0} W", generation);
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    let map = match &args.register_map {
        Some(path) => RegisterMap::from_file(path)?,
        None => RegisterMap::for_model(&args.model)?,
    };

    let socket_addr = format!("{}:{}", args.address, args.port);
    let listener = TcpListener::bind(&socket_addr)
        .await
        .with_context(|| format!("Failed to bind {}", socket_addr))?;
    info!("Serving {} registers on {}", map.len(), listener.local_addr()?);

    let inverter = SimulatedInverter::new();
    update(&inverter, &map, 0.0, args.peak_watts, "SIM0000001");
    let server = serve_simulator(listener, inverter.clone());

    let started = Instant::now();
    let period = args.period.max(1) as f64;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let phase = started.elapsed().as_secs_f64() / period * 2.0 * PI;
                let level = (1.0 - phase.cos()) / 2.0;
                update(&inverter, &map, level, args.peak_watts, "SIM0000001");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping simulator");
                break;
            }
        }
    }
    server.abort();
    Ok(())
}
