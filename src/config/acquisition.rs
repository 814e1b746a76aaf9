// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration
//!
//! This module defines the structures for configuring the poll cadence,
//! the upload window and the plausibility filtering of the acquisition stage.

use serde::{Deserialize, Serialize};

/// What a poll cycle does when one register read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole sweep on the first failed read (default)
    #[default]
    AbortCycle,
    /// Record the failed register as absent and keep reading the others
    SkipRegister,
}

/// Strict upper bounds above which a reading is treated as noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityBounds {
    /// Total active power in watts
    #[serde(default = "default_generation_watts")]
    pub generation_watts: f64,
    /// MPPT string voltage in volts
    #[serde(default = "default_mppt_voltage")]
    pub mppt_voltage: f64,
    /// Daily import energy
    #[serde(default = "default_import_energy")]
    pub import_energy: f64,
    /// Daily yield in kWh
    #[serde(default = "default_daily_yield")]
    pub daily_yield: f64,
}

fn default_generation_watts() -> f64 {
    90000.0
}

fn default_mppt_voltage() -> f64 {
    9000.0
}

fn default_import_energy() -> f64 {
    50000.0
}

fn default_daily_yield() -> f64 {
    1000.0
}

impl Default for PlausibilityBounds {
    fn default() -> Self {
        Self {
            generation_watts: default_generation_watts(),
            mppt_voltage: default_mppt_voltage(),
            import_energy: default_import_energy(),
            daily_yield: default_daily_yield(),
        }
    }
}

/// Configuration for the data acquisition process.
///
/// This structure contains settings that control how often the inverter is
/// polled, how many polls make up one upload window, and in which time zone
/// reports are stamped.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AcquisitionConfig {
    /// Time interval in seconds between consecutive polls.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Length of an upload window in minutes.
    #[serde(default = "default_upload_interval_minutes")]
    pub upload_interval_minutes: u64,

    /// IANA time zone used for report dates and times.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Behaviour on a failed register read.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Plausibility filtering of the tracked metrics.
    #[serde(default)]
    pub bounds: PlausibilityBounds,
}

fn default_scan_interval_secs() -> u64 {
    30
}

fn default_upload_interval_minutes() -> u64 {
    5
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            upload_interval_minutes: default_upload_interval_minutes(),
            timezone: default_timezone(),
            failure_policy: FailurePolicy::default(),
            bounds: PlausibilityBounds::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Number of poll cycles in one upload window:
    /// `(60 / scan_interval_secs) * upload_interval_minutes`, rounded up.
    pub fn cycles_per_upload(&self) -> u64 {
        let scan = self.scan_interval_secs.max(1) as f64;
        let cycles = (60.0 / scan) * self.upload_interval_minutes as f64;
        (cycles.ceil() as u64).max(1)
    }
}
