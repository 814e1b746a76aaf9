// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust inverter monitor library
//!
//! This library polls a solar inverter over Modbus TCP, decodes its registers,
//! averages the readings over an upload window and reports them to PVOutput.
//!
//! The pipeline, leaf first:
//!
//! - [`decoder`]: raw register words to typed, scaled values
//! - [`acquisition`]: one sweep of the register map into a snapshot
//! - [`aggregation`]: plausibility filtering and window accumulators
//! - [`report`]: window closing, payload and upload
//! - [`scheduler`]: drift-corrected periodic driver
//! - [`daemon`]: wires everything together from the [`config`]

pub mod acquisition;
pub mod aggregation;
pub mod config;
pub mod daemon;
pub mod decoder;
pub mod error;
pub mod modbus;
pub mod register_map;
pub mod report;
pub mod scheduler;
