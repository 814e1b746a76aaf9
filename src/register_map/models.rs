// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Built-in register maps
//!
//! Input register maps for the Sungrow inverter families this monitor ships
//! with. Register numbers are the 1-based numbers of the vendor's Modbus
//! documentation.
//!
//! | Model       | Family                            | Consumption register |
//! |-------------|-----------------------------------|----------------------|
//! | `sg-ktl`    | SG...KTL string inverters         | no                   |
//! | `sh-hybrid` | SH...RS hybrid inverters          | 5097 import energy   |

use super::{DataType, MetricBindings, RegisterMap, RegisterSpec, Scale};

/// Names accepted by `inverter.model`.
pub const MODELS: [&str; 2] = ["sg-ktl", "sh-hybrid"];

const DAILY_YIELD: &str = "5003 - Daily power yields";
const MPPT1_VOLTAGE: &str = "5011 - MPPT 1 voltage";
const MPPT2_VOLTAGE: &str = "5013 - MPPT 2 voltage";
const ACTIVE_POWER: &str = "5031 - Total active power";
const IMPORT_ENERGY: &str = "5097 - Daily import energy";

/// Built-in map for `model`, if there is one.
pub fn builtin(model: &str) -> Option<RegisterMap> {
    match model {
        "sg-ktl" => Some(string_inverter()),
        "sh-hybrid" => Some(hybrid_inverter()),
        _ => None,
    }
}

fn common_registers() -> Vec<RegisterSpec> {
    vec![
        RegisterSpec::new("4990 - Serial number", 4990, DataType::Str16, Scale::None),
        RegisterSpec::new("5001 - Nominal active power", 5001, DataType::U16, Scale::Fix1),
        RegisterSpec::new(DAILY_YIELD, 5003, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5004 - Total power yields", 5004, DataType::U32, Scale::None),
        RegisterSpec::new("5006 - Total running time", 5006, DataType::U32, Scale::None),
        RegisterSpec::new("5008 - Internal temperature", 5008, DataType::S16, Scale::Fix1),
        RegisterSpec::new(MPPT1_VOLTAGE, 5011, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5012 - MPPT 1 current", 5012, DataType::U16, Scale::Fix1),
        RegisterSpec::new(MPPT2_VOLTAGE, 5013, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5014 - MPPT 2 current", 5014, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5017 - Total DC power", 5017, DataType::U32, Scale::None),
        RegisterSpec::new("5019 - Phase A voltage", 5019, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5022 - Phase A current", 5022, DataType::U16, Scale::Fix1),
        RegisterSpec::new(ACTIVE_POWER, 5031, DataType::U32, Scale::None),
        RegisterSpec::new("5033 - Reactive power", 5033, DataType::S32, Scale::None),
        RegisterSpec::new("5035 - Power factor", 5035, DataType::S16, Scale::Fix3),
        RegisterSpec::new("5036 - Grid frequency", 5036, DataType::U16, Scale::Fix1),
        RegisterSpec::new("5038 - Work state", 5038, DataType::U16, Scale::None),
    ]
}

fn string_inverter() -> RegisterMap {
    RegisterMap {
        registers: common_registers(),
        metrics: MetricBindings {
            generation: ACTIVE_POWER.to_string(),
            voltage_1: MPPT1_VOLTAGE.to_string(),
            voltage_2: Some(MPPT2_VOLTAGE.to_string()),
            consumption: None,
            daily_yield: Some(DAILY_YIELD.to_string()),
        },
    }
}

fn hybrid_inverter() -> RegisterMap {
    let mut registers = common_registers();
    registers.push(RegisterSpec::new(
        "5083 - Meter power",
        5083,
        DataType::S32,
        Scale::None,
    ));
    registers.push(RegisterSpec::new(IMPORT_ENERGY, 5097, DataType::U16, Scale::Fix1));
    registers.push(RegisterSpec::new(
        "5098 - Total import energy",
        5098,
        DataType::U32,
        Scale::Fix1,
    ));

    RegisterMap {
        registers,
        metrics: MetricBindings {
            generation: ACTIVE_POWER.to_string(),
            voltage_1: MPPT1_VOLTAGE.to_string(),
            voltage_2: Some(MPPT2_VOLTAGE.to_string()),
            consumption: Some(IMPORT_ENERGY.to_string()),
            daily_yield: Some(DAILY_YIELD.to_string()),
        },
    }
}
