// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the inverter monitor
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The application's configuration is organized as a nested structure with sections:
//! - `inverter`: Modbus TCP connection and register map selection
//! - `acquisition`: Poll cadence, upload window, time zone and plausibility bounds
//! - `pvoutput`: Collector endpoint and credentials
//!
//! ## Usage
//!
//! ```no_run
//! use rust_inverter_monitor::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("192.168.1.60".to_string()), // Inverter address
//!     Some(502),                        // Inverter port
//!     None,                             // Model
//!     Some(10),                         // Scan interval
//!     None,                             // Upload interval
//!     false,                            // Dry run
//! );
//!
//! println!(
//!     "Polling {} every {}s",
//!     config.inverter.address, config.acquisition.scan_interval_secs
//! );
//! ```

pub mod acquisition;
pub mod inverter;
pub mod pvoutput;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::{AcquisitionConfig, FailurePolicy, PlausibilityBounds};
pub use inverter::InverterConfig;
pub use pvoutput::PvOutputConfig;
pub use utils::output_config_schema;

use crate::register_map::RegisterMap;

/// Root configuration structure for the inverter monitor.
///
/// The configuration is designed to be deserialized from and serialized to YAML
/// using the serde framework. The structure is validated against a JSON schema
/// to ensure all required fields are present and have valid values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Modbus connection to the inverter.
    #[serde(default)]
    pub inverter: InverterConfig,

    /// Poll cadence, upload window and plausibility filtering.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Report upload to PVOutput.
    #[serde(default)]
    pub pvoutput: PvOutputConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file failing schema
    /// validation, deserialization or the additional rules produces an error
    /// and a `<name>.sample.yaml` file with defaults next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let validator = utils::schema_validator()?;
        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate the configuration against the rules the schema cannot express.
    pub fn validate(&self) -> Result<()> {
        utils::validate_specific_rules(self)
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing configuration.
    ///
    /// # Parameters
    ///
    /// * `inverter_address` - Network address of the inverter
    /// * `inverter_port` - Modbus TCP port of the inverter
    /// * `model` - Built-in register map name
    /// * `scan_interval_secs` - Poll interval in seconds
    /// * `upload_interval_minutes` - Upload window in minutes
    /// * `dry_run` - If true, reports are computed and logged but never sent
    pub fn apply_args(
        &mut self,
        inverter_address: Option<String>,
        inverter_port: Option<u16>,
        model: Option<String>,
        scan_interval_secs: Option<u64>,
        upload_interval_minutes: Option<u64>,
        dry_run: bool,
    ) {
        if let Some(address) = inverter_address {
            debug!("Overriding inverter address from command line: {}", address);
            self.inverter.address = address;
        }
        if let Some(port) = inverter_port {
            debug!("Overriding inverter port from command line: {}", port);
            self.inverter.port = port;
        }
        if let Some(model) = model {
            debug!("Overriding inverter model from command line: {}", model);
            self.inverter.model = model;
        }
        if let Some(scan) = scan_interval_secs {
            debug!("Overriding scan interval from command line: {}", scan);
            self.acquisition.scan_interval_secs = scan;
        }
        if let Some(upload) = upload_interval_minutes {
            debug!("Overriding upload interval from command line: {}", upload);
            self.acquisition.upload_interval_minutes = upload;
        }
        if dry_run {
            debug!("Dry run requested, disabling uploads");
            self.pvoutput.enabled = false;
        }
    }

    /// Time zone used to stamp reports.
    pub fn timezone(&self) -> Result<Tz> {
        self.acquisition
            .timezone
            .parse::<Tz>()
            .map_err(|e| {
                anyhow::anyhow!("Unknown time zone '{}': {}", self.acquisition.timezone, e)
            })
    }

    /// Register map selected by `inverter.register_map_file` or `inverter.model`.
    pub fn register_map(&self) -> Result<RegisterMap> {
        match &self.inverter.register_map_file {
            Some(file) => RegisterMap::from_file(file),
            None => RegisterMap::for_model(&self.inverter.model)
                .with_context(|| format!("No register map for model '{}'", self.inverter.model)),
        }
    }
}
