// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The monitor cycle: acquire, aggregate, maybe report.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, info};

use crate::acquisition::SampleAcquirer;
use crate::aggregation::{AggregationState, Aggregator};
use crate::config::Config;
use crate::modbus::{RegisterTransport, TcpRegisterTransport};
use crate::register_map::RegisterSpec;
use crate::report::{PvOutputUploader, ReportEmitter, ReportUploader};
use crate::scheduler::ScheduledTask;

/// One device's pipeline, run once per scheduler tick.
///
/// The transport is connected at the start of every cycle and closed at its
/// end, successful or not.
pub struct MonitorCycle {
    transport: Box<dyn RegisterTransport>,
    registers: Vec<RegisterSpec>,
    acquirer: SampleAcquirer,
    aggregator: Aggregator,
    emitter: ReportEmitter,
    state: AggregationState,
    scan_interval_secs: u64,
}

impl MonitorCycle {
    pub fn new(
        transport: Box<dyn RegisterTransport>,
        registers: Vec<RegisterSpec>,
        acquirer: SampleAcquirer,
        aggregator: Aggregator,
        emitter: ReportEmitter,
        scan_interval_secs: u64,
    ) -> Self {
        Self {
            transport,
            registers,
            acquirer,
            aggregator,
            emitter,
            state: AggregationState::new(),
            scan_interval_secs,
        }
    }

    /// Build the pipeline described by `config` around `transport`.
    ///
    /// Reports go to PVOutput when `pvoutput.enabled` is set, otherwise they
    /// are only logged.
    pub fn with_transport(config: &Config, transport: Box<dyn RegisterTransport>) -> Result<Self> {
        let map = config.register_map()?;
        let timezone = config.timezone()?;

        let uploader: Option<Box<dyn ReportUploader>> = if config.pvoutput.enabled {
            let uploader = PvOutputUploader::from_config(&config.pvoutput)
                .context("Failed to build the PVOutput uploader")?;
            info!("Reports will be posted to {}", uploader.url());
            Some(Box::new(uploader))
        } else {
            info!("PVOutput upload disabled, reports will only be logged");
            None
        };

        let aggregator = Aggregator::new(
            map.metrics.clone(),
            config.acquisition.bounds,
            config.pvoutput.upload_consumption,
        );
        let emitter = ReportEmitter::new(
            config.acquisition.cycles_per_upload(),
            config.acquisition.scan_interval_secs,
            timezone,
            aggregator.tracks_consumption(),
            uploader,
        );

        Ok(Self::new(
            transport,
            map.registers,
            SampleAcquirer::new(config.acquisition.failure_policy),
            aggregator,
            emitter,
            config.acquisition.scan_interval_secs,
        ))
    }

    /// Build the pipeline for the Modbus TCP inverter described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = TcpRegisterTransport::from_config(&config.inverter);
        Self::with_transport(config, Box::new(transport))
    }

    pub fn state(&self) -> &AggregationState {
        &self.state
    }

    /// Run one cycle. Returns `true` when the cycle closed a window with a report.
    pub async fn poll(&mut self) -> bool {
        let result = self
            .acquirer
            .acquire(self.transport.as_mut(), &self.registers)
            .await;
        self.transport.close().await;

        match result {
            Ok(snapshot) => self.aggregator.absorb(&snapshot, &mut self.state),
            Err(e) => {
                error!("{}", e);
                self.aggregator.record_failed_cycle(&mut self.state);
            }
        }

        let emitted = self.emitter.maybe_emit(&mut self.state).await;
        info!(
            "Loop {} of {} complete. Sleeping {}s....",
            self.state.window.cycle_count,
            self.emitter.cycles_per_upload(),
            self.scan_interval_secs
        );
        emitted
    }
}

#[async_trait]
impl ScheduledTask for MonitorCycle {
    async fn run_cycle(&mut self) -> Result<()> {
        self.poll().await;
        Ok(())
    }
}
