// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types for the monitoring pipeline
//!
//! Library-level failures are typed with `thiserror` so the pipeline can decide
//! how far each one propagates:
//!
//! - [`TransportError`]: the inverter could not be reached or a read failed.
//!   Aborts the current acquisition, never the process.
//! - [`AcquisitionError`]: a poll cycle did not produce a snapshot.
//! - [`UploadError`]: the collector rejected a report or could not be reached.
//!   Logged, the window is still reset.
//! - [`RegisterMapError`]: a register map failed validation at load time.
//!
//! Application plumbing (configuration, daemon start-up, binaries) uses `anyhow`.

use thiserror::Error;

/// Failure of the register transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device address could not be resolved or the TCP connection failed
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// A read was attempted without an open connection
    #[error("transport is not connected")]
    NotConnected,

    /// The device did not answer within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device answered with a Modbus exception code
    #[error("device returned exception: {0}")]
    Exception(String),

    /// Protocol or I/O level failure reported by the Modbus client
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device answered with fewer words than requested
    #[error("short read at address {address}: expected {expected} words, got {received}")]
    ShortRead {
        address: u16,
        expected: u16,
        received: usize,
    },
}

/// A poll cycle that did not yield a snapshot.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The connection could not be (re)established at the start of the cycle
    #[error("connection not possible, check settings or connection: {0}")]
    Connect(#[source] TransportError),

    /// A register read failed and the sweep was aborted
    #[error("read of register '{register}' failed: {source}")]
    Read {
        register: String,
        #[source]
        source: TransportError,
    },

    /// Every register of the sweep failed (per-register isolation policy)
    #[error("all {0} register reads failed")]
    AllRegistersFailed(usize),
}

/// Failure while delivering a report to the collector.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request never produced a response
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The collector answered with a non-success status
    #[error("collector answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A header value could not be built from the configured credentials
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// Register map validation failure.
#[derive(Debug, Error, PartialEq)]
pub enum RegisterMapError {
    #[error("unknown inverter model '{0}'")]
    UnknownModel(String),

    #[error("register map is empty")]
    Empty,

    #[error("duplicate register name '{0}'")]
    DuplicateName(String),

    #[error("register '{0}' has address 0, addresses are 1-based")]
    ZeroAddress(String),

    #[error("metric '{metric}' is bound to unknown register '{register}'")]
    UnboundMetric {
        metric: &'static str,
        register: String,
    },

    #[error("metric '{metric}' is bound to text register '{register}'")]
    TextMetric {
        metric: &'static str,
        register: String,
    },
}
