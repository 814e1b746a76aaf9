// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module is the composition root of the monitor: it builds the
//! transport, register map, aggregator and report emitter from the
//! configuration, binds them into a [`MonitorCycle`] and runs that cycle on a
//! drift-corrected [`Scheduler`](crate::scheduler::Scheduler).
//!
//! ## Components
//!
//! * **Launch Daemon**: starting, monitoring, and gracefully shutting down the
//!   scheduled tasks
//! * **Monitor**: the per-tick acquisition, aggregation and report pipeline
//!
//! ## Usage
//!
//! ```no_run
//! use rust_inverter_monitor::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
pub mod monitor;

pub use launch_daemon::Daemon;
pub use monitor::MonitorCycle;
