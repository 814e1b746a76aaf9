// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register map description
//!
//! A register map is static configuration: the ordered list of input registers
//! to poll, how each one is encoded on the wire, and which registers feed the
//! tracked metrics. Maps are either built in (selected by `inverter.model`) or
//! loaded from a YAML file:
//!
//! ```yaml
//! registers:
//!   - name: "5031 - Total active power"
//!     address: 5031
//!     data_type: U32
//!     scale: NONE
//!   - name: "5011 - MPPT 1 voltage"
//!     address: 5011
//!     data_type: U16
//!     scale: FIX1
//! metrics:
//!   generation: "5031 - Total active power"
//!   voltage_1: "5011 - MPPT 1 voltage"
//! ```
//!
//! Tags are resolved into closed enums when the map is deserialized. An
//! unrecognised data type becomes [`DataType::Unknown`] and is decoded as a raw
//! unsigned 16-bit word; an unrecognised scale means no scaling.

pub mod models;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RegisterMapError;

/// On-wire encoding of a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum DataType {
    S16,
    U16,
    S32,
    U32,
    U64,
    Str16,
    Str32,
    /// Any tag this monitor does not know, decoded as a raw unsigned word
    Unknown,
}

impl From<String> for DataType {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "S16" => DataType::S16,
            "U16" => DataType::U16,
            "S32" => DataType::S32,
            "U32" => DataType::U32,
            "U64" => DataType::U64,
            "STR16" => DataType::Str16,
            "STR32" => DataType::Str32,
            _ => DataType::Unknown,
        }
    }
}

impl From<DataType> for &'static str {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::S16 => "S16",
            DataType::U16 => "U16",
            DataType::S32 => "S32",
            DataType::U32 => "U32",
            DataType::U64 => "U64",
            DataType::Str16 => "STR16",
            DataType::Str32 => "STR32",
            DataType::Unknown => "UNKNOWN",
        }
    }
}

impl DataType {
    /// Number of 16-bit words the type occupies.
    pub fn width(self) -> u16 {
        match self {
            DataType::S16 | DataType::U16 | DataType::Unknown => 1,
            DataType::S32 | DataType::U32 => 2,
            DataType::U64 => 4,
            DataType::Str16 => 8,
            DataType::Str32 => 16,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, DataType::Str16 | DataType::Str32)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::S16 | DataType::S32)
    }

    /// 32-bit values travel low word first. Every other type, including U64,
    /// is sent high word first.
    pub fn low_word_first(self) -> bool {
        matches!(self, DataType::S32 | DataType::U32)
    }
}

/// Fixed-point scale applied to integer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Scale {
    #[default]
    None,
    Fix1,
    Fix2,
    Fix3,
}

impl From<String> for Scale {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "FIX1" => Scale::Fix1,
            "FIX2" => Scale::Fix2,
            "FIX3" => Scale::Fix3,
            _ => Scale::None,
        }
    }
}

impl From<Scale> for &'static str {
    fn from(scale: Scale) -> Self {
        match scale {
            Scale::None => "NONE",
            Scale::Fix1 => "FIX1",
            Scale::Fix2 => "FIX2",
            Scale::Fix3 => "FIX3",
        }
    }
}

impl Scale {
    /// Number of decimal digits implied by the scale.
    pub fn decimals(self) -> u32 {
        match self {
            Scale::None => 0,
            Scale::Fix1 => 1,
            Scale::Fix2 => 2,
            Scale::Fix3 => 3,
        }
    }
}

/// One register to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Unique display name, conventionally prefixed with the register number
    pub name: String,
    /// 1-based register number as printed in the vendor documentation
    pub address: u16,
    pub data_type: DataType,
    #[serde(default)]
    pub scale: Scale,
}

impl RegisterSpec {
    pub fn new(name: impl Into<String>, address: u16, data_type: DataType, scale: Scale) -> Self {
        Self {
            name: name.into(),
            address,
            data_type,
            scale,
        }
    }

    /// Zero-based address sent on the wire.
    pub fn protocol_address(&self) -> u16 {
        self.address.saturating_sub(1)
    }

    pub fn width(&self) -> u16 {
        self.data_type.width()
    }
}

/// Register names feeding each tracked metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricBindings {
    /// Instantaneous generated power, the primary metric of a report
    pub generation: String,
    /// First MPPT string voltage
    pub voltage_1: String,
    /// Second MPPT string voltage, averaged with the first when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_2: Option<String>,
    /// Imported energy, uploaded only when consumption upload is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<String>,
    /// Daily yield, logged for diagnostics and never uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_yield: Option<String>,
}

/// Ordered registers plus metric bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMap {
    pub registers: Vec<RegisterSpec>,
    pub metrics: MetricBindings,
}

impl RegisterMap {
    /// Build and validate a map.
    pub fn new(
        registers: Vec<RegisterSpec>,
        metrics: MetricBindings,
    ) -> std::result::Result<Self, RegisterMapError> {
        let map = Self { registers, metrics };
        map.validate()?;
        Ok(map)
    }

    /// Look up a built-in map by model name.
    pub fn for_model(model: &str) -> std::result::Result<Self, RegisterMapError> {
        let map = models::builtin(model)
            .ok_or_else(|| RegisterMapError::UnknownModel(model.to_string()))?;
        map.validate()?;
        Ok(map)
    }

    /// Load a map from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading register map from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read register map at {:?}", path))?;
        let map: RegisterMap = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse register map from {:?}", path))?;
        map.validate()
            .with_context(|| format!("Invalid register map in {:?}", path))?;
        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&RegisterSpec> {
        self.registers.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    fn validate(&self) -> std::result::Result<(), RegisterMapError> {
        if self.registers.is_empty() {
            return Err(RegisterMapError::Empty);
        }

        let mut seen = HashSet::new();
        for spec in &self.registers {
            if spec.address == 0 {
                return Err(RegisterMapError::ZeroAddress(spec.name.clone()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(RegisterMapError::DuplicateName(spec.name.clone()));
            }
        }

        let bindings = [
            ("generation", Some(&self.metrics.generation)),
            ("voltage_1", Some(&self.metrics.voltage_1)),
            ("voltage_2", self.metrics.voltage_2.as_ref()),
            ("consumption", self.metrics.consumption.as_ref()),
            ("daily_yield", self.metrics.daily_yield.as_ref()),
        ];
        for (metric, register) in bindings {
            let Some(register) = register else { continue };
            match self.get(register) {
                None => {
                    return Err(RegisterMapError::UnboundMetric {
                        metric,
                        register: register.clone(),
                    })
                }
                Some(spec) if spec.data_type.is_text() => {
                    return Err(RegisterMapError::TextMetric {
                        metric,
                        register: register.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> MetricBindings {
        MetricBindings {
            generation: "5031 - Total active power".to_string(),
            voltage_1: "5011 - MPPT 1 voltage".to_string(),
            voltage_2: None,
            consumption: None,
            daily_yield: None,
        }
    }

    fn registers() -> Vec<RegisterSpec> {
        vec![
            RegisterSpec::new("5031 - Total active power", 5031, DataType::U32, Scale::None),
            RegisterSpec::new("5011 - MPPT 1 voltage", 5011, DataType::U16, Scale::Fix1),
        ]
    }

    #[test]
    fn test_widths() {
        assert_eq!(DataType::S16.width(), 1);
        assert_eq!(DataType::U16.width(), 1);
        assert_eq!(DataType::S32.width(), 2);
        assert_eq!(DataType::U32.width(), 2);
        assert_eq!(DataType::U64.width(), 4);
        assert_eq!(DataType::Str16.width(), 8);
        assert_eq!(DataType::Str32.width(), 16);
        assert_eq!(DataType::Unknown.width(), 1);
    }

    #[test]
    fn test_protocol_address_is_zero_based() {
        let spec = RegisterSpec::new("5031 - Total active power", 5031, DataType::U32, Scale::None);
        assert_eq!(spec.protocol_address(), 5030);
    }

    #[test]
    fn test_tags_resolve_at_load_time() {
        let yaml = r#"
registers:
  - name: "5031 - Total active power"
    address: 5031
    data_type: U32
    scale: NONE
  - name: "5011 - MPPT 1 voltage"
    address: 5011
    data_type: U16
    scale: FIX1
  - name: "4990 - Serial number"
    address: 4990
    data_type: STR16
  - name: "6000 - Mystery"
    address: 6000
    data_type: F32
    scale: FIX9
metrics:
  generation: "5031 - Total active power"
  voltage_1: "5011 - MPPT 1 voltage"
"#;
        let map: RegisterMap = serde_yml::from_str(yaml).unwrap();
        assert_eq!(map.registers[0].data_type, DataType::U32);
        assert_eq!(map.registers[1].scale, Scale::Fix1);
        assert_eq!(map.registers[2].data_type, DataType::Str16);
        assert_eq!(map.registers[2].scale, Scale::None);
        assert_eq!(map.registers[3].data_type, DataType::Unknown);
        assert_eq!(map.registers[3].scale, Scale::None);
        assert!(map.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_maps() {
        assert_eq!(
            RegisterMap::new(Vec::new(), bindings()).unwrap_err(),
            RegisterMapError::Empty
        );

        let mut duplicated = registers();
        duplicated.push(duplicated[0].clone());
        assert!(matches!(
            RegisterMap::new(duplicated, bindings()),
            Err(RegisterMapError::DuplicateName(_))
        ));

        let mut zero = registers();
        zero[1].address = 0;
        assert!(matches!(
            RegisterMap::new(zero, bindings()),
            Err(RegisterMapError::ZeroAddress(_))
        ));

        let mut unbound = bindings();
        unbound.consumption = Some("5097 - Daily import energy".to_string());
        assert!(matches!(
            RegisterMap::new(registers(), unbound),
            Err(RegisterMapError::UnboundMetric { metric: "consumption", .. })
        ));

        let mut text = registers();
        text.push(RegisterSpec::new("4990 - Serial number", 4990, DataType::Str16, Scale::None));
        let mut text_bindings = bindings();
        text_bindings.daily_yield = Some("4990 - Serial number".to_string());
        assert!(matches!(
            RegisterMap::new(text, text_bindings),
            Err(RegisterMapError::TextMetric { .. })
        ));
    }

    #[test]
    fn test_builtin_models_are_valid() {
        for model in models::MODELS {
            let map = RegisterMap::for_model(model).unwrap();
            assert!(!map.is_empty());
        }
        assert_eq!(
            RegisterMap::for_model("sg-unknown").unwrap_err(),
            RegisterMapError::UnknownModel("sg-unknown".to_string())
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.yaml");
        let map = RegisterMap::new(registers(), bindings()).unwrap();
        fs::write(&path, serde_yml::to_string(&map).unwrap()).unwrap();

        let loaded = RegisterMap::from_file(&path).unwrap();
        assert_eq!(loaded, map);
    }
}
