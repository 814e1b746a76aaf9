// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PVOutput collector configuration

use serde::{Deserialize, Serialize};

/// Configuration for the report upload to PVOutput.
///
/// When `enabled` is `false` the monitor still closes windows and logs the
/// computed payload, but no request is sent. Uploads are disabled by default
/// so that a freshly generated configuration is valid without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvOutputConfig {
    /// Send reports to the collector.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Add status service endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// API key, sent in the `X-Pvoutput-Apikey` header.
    #[serde(default)]
    pub api_key: String,

    /// System identifier, sent in the `X-Pvoutput-SystemId` header.
    #[serde(default)]
    pub system_id: String,

    /// Upload mean import energy as `v4`.
    #[serde(default)]
    pub upload_consumption: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    false
}

fn default_url() -> String {
    "https://pvoutput.org/service/r2/addstatus.jsp".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for PvOutputConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_url(),
            api_key: String::new(),
            system_id: String::new(),
            upload_consumption: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}
