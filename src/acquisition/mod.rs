// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample acquisition module
//!
//! This module drives one poll cycle: it connects the register transport,
//! reads every register of the map in order, decodes the words and collects
//! the values into a [`Snapshot`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::config::FailurePolicy;
use crate::decoder::{decode, DecodedValue};
use crate::error::AcquisitionError;
use crate::modbus::RegisterTransport;
use crate::register_map::RegisterSpec;

/// Decoded values of one poll cycle, keyed by register name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: HashMap<String, DecodedValue>,
    /// Set once every register of the sweep has been iterated
    pub captured_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: DecodedValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.values.get(name)
    }

    /// Numeric reading of a register, `None` when missing, absent or textual.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(DecodedValue::as_f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.captured_at.is_some()
    }
}

/// Reads a register map sweep through a [`RegisterTransport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleAcquirer {
    policy: FailurePolicy,
}

impl SampleAcquirer {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    /// Run one sweep over `specs`, in order.
    ///
    /// The transport is connected first; a connection failure always aborts.
    /// A read failure aborts under [`FailurePolicy::AbortCycle`] and records the
    /// register as [`DecodedValue::Absent`] under [`FailurePolicy::SkipRegister`].
    /// The transport is left open, closing it is up to the caller.
    pub async fn acquire(
        &self,
        transport: &mut dyn RegisterTransport,
        specs: &[RegisterSpec],
    ) -> Result<Snapshot, AcquisitionError> {
        transport.connect().await.map_err(AcquisitionError::Connect)?;

        let mut snapshot = Snapshot::new();
        let mut failures = 0usize;

        for spec in specs {
            match transport
                .read_registers(spec.protocol_address(), spec.width())
                .await
            {
                Ok(words) => {
                    let value = decode(spec, &words);
                    debug!("{}: {}", spec.name, value);
                    snapshot.insert(spec.name.clone(), value);
                }
                Err(source) => match self.policy {
                    FailurePolicy::AbortCycle => {
                        return Err(AcquisitionError::Read {
                            register: spec.name.clone(),
                            source,
                        });
                    }
                    FailurePolicy::SkipRegister => {
                        warn!("Skipping register {}: {}", spec.name, source);
                        failures += 1;
                        snapshot.insert(spec.name.clone(), DecodedValue::Absent);
                    }
                },
            }
        }

        if !specs.is_empty() && failures == specs.len() {
            return Err(AcquisitionError::AllRegistersFailed(failures));
        }

        snapshot.captured_at = Some(Utc::now());
        Ok(snapshot)
    }
}
