// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;

use super::Config;

const SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_inverter_monitor --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA).context("Failed to parse JSON schema")?;
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;
    println!("{}", formatted_schema);
    Ok(())
}

/// Build a validator for the embedded configuration schema.
pub(crate) fn schema_validator() -> Result<jsonschema::Validator> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA).context("Failed to parse JSON schema")?;
    jsonschema::draft202012::options()
        .should_validate_formats(true)
        .build(&schema)
        .map_err(|e| anyhow::anyhow!("Invalid configuration schema: {}", e))
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Check if a string looks like a DNS hostname.
fn is_valid_hostname(addr: &str) -> bool {
    !addr.is_empty()
        && addr.len() <= 253
        && addr.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Intervals**: scan interval of at least one second, upload window of at least one minute
/// - **Time zone**: must be an IANA time zone name
/// - **Inverter address**: IP address or hostname, port in 1-65535
/// - **Register map**: the selected model or file must load and validate
/// - **PVOutput**: http(s) URL, credentials required when uploads are enabled
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.acquisition.scan_interval_secs == 0 {
        anyhow::bail!("Scan interval must be at least one second");
    }
    if config.acquisition.upload_interval_minutes == 0 {
        anyhow::bail!("Upload interval must be at least one minute");
    }
    if config.acquisition.scan_interval_secs > config.acquisition.upload_interval_minutes * 60 {
        debug!(
            "Scan interval {}s is longer than the upload window, every cycle closes a window",
            config.acquisition.scan_interval_secs
        );
    }

    config.timezone()?;

    if !is_valid_ip_address(&config.inverter.address)
        && !is_valid_hostname(&config.inverter.address)
    {
        anyhow::bail!("Invalid inverter address: {}", config.inverter.address);
    }
    if config.inverter.port == 0 {
        anyhow::bail!("Invalid inverter port: {}", config.inverter.port);
    }

    config.register_map()?;

    let url = url::Url::parse(&config.pvoutput.url)
        .with_context(|| format!("Invalid PVOutput URL: {}", config.pvoutput.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("PVOutput URL must use http or https: {}", config.pvoutput.url);
    }
    if config.pvoutput.enabled {
        if config.pvoutput.api_key.trim().is_empty() {
            anyhow::bail!("PVOutput upload is enabled but no API key is configured");
        }
        if config.pvoutput.system_id.trim().is_empty() {
            anyhow::bail!("PVOutput upload is enabled but no system id is configured");
        }
    }

    Ok(())
}
