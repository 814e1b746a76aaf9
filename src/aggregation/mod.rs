// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Windowed aggregation of the tracked metrics
//!
//! Every poll cycle ends in the [`Aggregator`]: readings of the bound registers
//! are checked against their [`PlausibilityBounds`] and appended to the
//! accumulators of an [`AggregationState`]. Cycles are counted whether the
//! acquisition succeeded or not.
//!
//! The state is owned by the cycle task and only ever borrowed mutably by the
//! aggregator and the [`ReportEmitter`](crate::report::ReportEmitter).

use log::{info, warn};

use crate::acquisition::Snapshot;
use crate::config::PlausibilityBounds;
use crate::register_map::MetricBindings;

/// Metric families tracked across a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Generation,
    Voltage1,
    Voltage2,
    Consumption,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::Generation => "Total Active Power",
            Metric::Voltage1 => "MPPT 1 Voltage",
            Metric::Voltage2 => "MPPT 2 Voltage",
            Metric::Consumption => "Daily Import Energy",
        }
    }
}

/// Cycle counters.
///
/// `cycle_count` restarts at zero whenever a window closes. `attempt_count`
/// counts every cycle since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    pub cycle_count: u64,
    pub attempt_count: u64,
}

/// Accumulated samples of the current window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationState {
    pub generation: Vec<f64>,
    pub voltage_1: Vec<f64>,
    pub voltage_2: Vec<f64>,
    pub consumption: Vec<f64>,
    pub window: WindowState,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every accumulator and restart the cycle count.
    pub fn reset_window(&mut self) {
        self.generation.clear();
        self.voltage_1.clear();
        self.voltage_2.clear();
        self.consumption.clear();
        self.window.cycle_count = 0;
    }

    fn count_cycle(&mut self) {
        self.window.cycle_count += 1;
        self.window.attempt_count += 1;
    }
}

/// Arithmetic mean, `None` for an empty accumulator.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Filters snapshots and feeds the window accumulators.
#[derive(Debug, Clone)]
pub struct Aggregator {
    bindings: MetricBindings,
    bounds: PlausibilityBounds,
    track_consumption: bool,
}

impl Aggregator {
    /// Consumption is tracked only when `upload_consumption` is set and the
    /// register map binds a consumption register.
    pub fn new(
        bindings: MetricBindings,
        bounds: PlausibilityBounds,
        upload_consumption: bool,
    ) -> Self {
        if upload_consumption && bindings.consumption.is_none() {
            warn!(
                "Consumption upload requested but the register map has no import energy register"
            );
        }
        let track_consumption = upload_consumption && bindings.consumption.is_some();
        Self {
            bindings,
            bounds,
            track_consumption,
        }
    }

    pub fn tracks_consumption(&self) -> bool {
        self.track_consumption
    }

    /// Absorb one successful acquisition and count the cycle.
    pub fn absorb(&self, snapshot: &Snapshot, state: &mut AggregationState) {
        if let Some(value) = self.plausible(
            snapshot,
            Metric::Generation,
            Some(&self.bindings.generation),
            self.bounds.generation_watts,
        ) {
            state.generation.push(value);
        }
        if let Some(value) = self.plausible(
            snapshot,
            Metric::Voltage1,
            Some(&self.bindings.voltage_1),
            self.bounds.mppt_voltage,
        ) {
            state.voltage_1.push(value);
        }
        if self.bindings.voltage_2.is_some() {
            if let Some(value) = self.plausible(
                snapshot,
                Metric::Voltage2,
                self.bindings.voltage_2.as_deref(),
                self.bounds.mppt_voltage,
            ) {
                state.voltage_2.push(value);
            }
        }
        if let Some(register) = self.bindings.daily_yield.as_deref() {
            // Diagnostic only
            if let Some(value) = snapshot.numeric(register) {
                if value < self.bounds.daily_yield {
                    info!("{} = {}", register, value);
                }
            }
        }
        if self.track_consumption {
            if let Some(value) = self.plausible(
                snapshot,
                Metric::Consumption,
                self.bindings.consumption.as_deref(),
                self.bounds.import_energy,
            ) {
                state.consumption.push(value);
            }
        }

        state.count_cycle();
    }

    /// Count a cycle whose acquisition failed.
    pub fn record_failed_cycle(&self, state: &mut AggregationState) {
        state.count_cycle();
    }

    fn plausible(
        &self,
        snapshot: &Snapshot,
        metric: Metric,
        register: Option<&str>,
        bound: f64,
    ) -> Option<f64> {
        match register.and_then(|name| snapshot.numeric(name)) {
            Some(value) if value < bound => {
                info!("{} = {}", metric.label(), value);
                Some(value)
            }
            _ => {
                info!("Didn't get a read for {}", metric.label());
                None
            }
        }
    }
}
