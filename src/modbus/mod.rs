// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides the register transport used by the acquisition stage and
//! a simulated inverter for tests and bench work.
//!
//! ## Key Components
//!
//! - [`RegisterTransport`]: the narrow interface the pipeline needs from the wire:
//!   connect, read a block of input registers, close.
//! - [`TcpRegisterTransport`]: Modbus TCP client implementation backed by
//!   `tokio-modbus`.
//! - [`SimulatedInverter`]: a Modbus TCP server answering input register reads
//!   from an in-memory table, laid out with the same word order the decoder expects.
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client". The inverter is the server, the monitor is the client.

pub mod client;
pub mod simulator;

pub use client::TcpRegisterTransport;
pub use simulator::{encode_integer, encode_text, serve_simulator, SimulatedInverter};

use async_trait::async_trait;

use crate::error::TransportError;

/// Register transport collaborator.
///
/// Addresses are zero-based protocol addresses. `connect` must be idempotent:
/// it is called at the start of every poll cycle.
#[async_trait]
pub trait RegisterTransport: Send {
    /// Open the connection if it is not already open
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Read `count` consecutive input registers starting at `address`
    async fn read_registers(&mut self, address: u16, count: u16)
        -> Result<Vec<u16>, TransportError>;

    /// Close the connection. Closing a closed transport is a no-op.
    async fn close(&mut self);
}
