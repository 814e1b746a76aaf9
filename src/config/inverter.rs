// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Inverter connection configuration
//!
//! This module defines the structures for configuring the Modbus TCP connection
//! to the inverter and the register map used to read it.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP connection to the inverter.
///
/// # Fields
///
/// * `address` - IP address or hostname of the inverter (or its WiNet/LAN dongle)
/// * `port` - TCP port of the Modbus server (default: 502)
/// * `slave` - Modbus unit identifier (default: 1)
/// * `timeout_secs` - Timeout applied to the connection and to each read (default: 3)
/// * `retries` - Additional attempts for a failed read (default: 3)
/// * `model` - Built-in register map to use (default: `sg-ktl`)
/// * `register_map_file` - Optional YAML register map overriding `model`
///
/// # Example
///
/// ```
/// use rust_inverter_monitor::config::InverterConfig;
///
/// let inverter = InverterConfig {
///     address: "192.168.1.50".to_string(),
///     model: "sh-hybrid".to_string(),
///     ..InverterConfig::default()
/// };
/// assert_eq!(inverter.port, 502);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Network address of the inverter.
    pub address: String,

    /// The TCP port of the inverter Modbus server.
    ///
    /// Default value is 502, which is the standard Modbus TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Modbus unit identifier of the inverter.
    #[serde(default = "default_slave")]
    pub slave: u8,

    /// Timeout in seconds for connecting and for each register read.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of additional attempts when a read fails or comes back empty.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Inverter model, selecting one of the built-in register maps.
    #[serde(default = "default_model")]
    pub model: String,

    /// Path to a YAML register map. When set, `model` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_map_file: Option<String>,
}

fn default_port() -> u16 {
    502
}

fn default_slave() -> u8 {
    1
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_retries() -> u32 {
    3
}

fn default_model() -> String {
    "sg-ktl".to_string()
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.50".to_string(),
            port: default_port(),
            slave: default_slave(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            model: default_model(),
            register_map_file: None,
        }
    }
}
