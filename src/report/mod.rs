// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Window closing and report emission
//!
//! The [`ReportEmitter`] decides, after every cycle, whether the current window
//! is complete. A complete window with at least one generation sample produces
//! an [`UploadPayload`] that is handed to a [`ReportUploader`]. The
//! accumulators are cleared before delivery, so a window is reported at most
//! once whatever the outcome of the request.

pub mod pvoutput;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{error, info, warn};
use serde::Serialize;

use crate::aggregation::{mean, AggregationState};
use crate::error::UploadError;

pub use pvoutput::PvOutputUploader;

/// Parameters of one status report, serialized as the query string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadPayload {
    /// Date as `YYYYMMDD`
    #[serde(rename = "d")]
    pub date: String,
    /// Time as `HH:MM`
    #[serde(rename = "t")]
    pub time: String,
    /// Mean generation in watts
    #[serde(rename = "v2")]
    pub generation: f64,
    /// Mean consumption
    #[serde(rename = "v4", skip_serializing_if = "Option::is_none")]
    pub consumption: Option<f64>,
    /// Mean string voltage
    #[serde(rename = "v6", skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
}

/// Delivery of a report to the collector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportUploader: Send + Sync {
    async fn upload(&self, payload: &UploadPayload) -> Result<(), UploadError>;
}

/// Closes windows and emits their reports.
pub struct ReportEmitter {
    cycles_per_upload: u64,
    scan_interval_secs: u64,
    timezone: Tz,
    upload_consumption: bool,
    uploader: Option<Box<dyn ReportUploader>>,
}

impl ReportEmitter {
    /// Without an uploader the emitter runs dry: windows close and payloads
    /// are logged, nothing is sent.
    pub fn new(
        cycles_per_upload: u64,
        scan_interval_secs: u64,
        timezone: Tz,
        upload_consumption: bool,
        uploader: Option<Box<dyn ReportUploader>>,
    ) -> Self {
        Self {
            cycles_per_upload: cycles_per_upload.max(1),
            scan_interval_secs,
            timezone,
            upload_consumption,
            uploader,
        }
    }

    pub fn cycles_per_upload(&self) -> u64 {
        self.cycles_per_upload
    }

    /// Close the window if it is complete, stamping the report with the current time.
    pub async fn maybe_emit(&self, state: &mut AggregationState) -> bool {
        self.maybe_emit_at(state, Utc::now()).await
    }

    /// Close the window if it is complete, stamping the report with `now`.
    ///
    /// Returns `true` when a report was produced, whether or not its delivery succeeded.
    pub async fn maybe_emit_at(&self, state: &mut AggregationState, now: DateTime<Utc>) -> bool {
        if state.window.cycle_count < self.cycles_per_upload {
            return false;
        }

        let Some(payload) = self.build_payload(state, now) else {
            warn!(
                "No generation reading in the last {} cycles, nothing to upload",
                state.window.cycle_count
            );
            state.reset_window();
            return false;
        };

        info!(
            "{} individual observations were made (out of {} attempts) over the last {} minutes averaging {:.0} Watts",
            state.generation.len(),
            state.window.cycle_count,
            state.window.cycle_count * self.scan_interval_secs / 60,
            payload.generation
        );
        state.reset_window();

        match &self.uploader {
            Some(uploader) => {
                if let Err(e) = uploader.upload(&payload).await {
                    error!("Upload failed: {}", e);
                }
            }
            None => info!("Upload disabled, report not sent: {:?}", payload),
        }
        true
    }

    /// Payload for the current window, `None` when there is no generation sample.
    pub fn build_payload(
        &self,
        state: &AggregationState,
        now: DateTime<Utc>,
    ) -> Option<UploadPayload> {
        let generation = mean(&state.generation)?;
        let voltage = match (mean(&state.voltage_1), mean(&state.voltage_2)) {
            (Some(v1), Some(v2)) => Some((v1 + v2) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        };
        let consumption = if self.upload_consumption {
            mean(&state.consumption)
        } else {
            None
        };
        let local = now.with_timezone(&self.timezone);

        Some(UploadPayload {
            date: local.format("%Y%m%d").to_string(),
            time: local.format("%H:%M").to_string(),
            generation,
            consumption,
            voltage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockall::predicate::*;

    fn state(
        cycles: u64,
        generation: &[f64],
        voltage_1: &[f64],
        voltage_2: &[f64],
    ) -> AggregationState {
        let mut state = AggregationState::new();
        state.generation = generation.to_vec();
        state.voltage_1 = voltage_1.to_vec();
        state.voltage_2 = voltage_2.to_vec();
        state.window.cycle_count = cycles;
        state.window.attempt_count = cycles;
        state
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 5, 30).unwrap()
    }

    #[tokio::test]
    async fn test_no_emit_before_threshold() {
        let mut uploader = MockReportUploader::new();
        uploader.expect_upload().never();
        let emitter = ReportEmitter::new(10, 30, chrono_tz::UTC, false, Some(Box::new(uploader)));

        let mut state = state(9, &[100.0], &[300.0], &[]);
        assert!(!emitter.maybe_emit_at(&mut state, noon()).await);
        assert_eq!(state.window.cycle_count, 9);
        assert_eq!(state.generation.len(), 1);
    }

    #[tokio::test]
    async fn test_emit_resets_window() {
        let expected = UploadPayload {
            date: "20240309".to_string(),
            time: "12:05".to_string(),
            generation: 200.0,
            consumption: None,
            voltage: Some(360.0),
        };
        let mut uploader = MockReportUploader::new();
        uploader
            .expect_upload()
            .with(eq(expected))
            .times(1)
            .returning(|_| Ok(()));
        let emitter = ReportEmitter::new(10, 30, chrono_tz::UTC, false, Some(Box::new(uploader)));

        let mut state = state(10, &[100.0, 300.0], &[350.0], &[370.0]);
        state.consumption = vec![5.0];
        assert!(emitter.maybe_emit_at(&mut state, noon()).await);
        assert!(state.generation.is_empty());
        assert!(state.voltage_1.is_empty());
        assert!(state.voltage_2.is_empty());
        assert!(state.consumption.is_empty());
        assert_eq!(state.window.cycle_count, 0);
        assert_eq!(state.window.attempt_count, 10);
    }

    #[tokio::test]
    async fn test_empty_window_closes_without_upload() {
        let mut uploader = MockReportUploader::new();
        uploader.expect_upload().never();
        let emitter = ReportEmitter::new(10, 30, chrono_tz::UTC, false, Some(Box::new(uploader)));

        let mut state = state(10, &[], &[350.0], &[]);
        assert!(!emitter.maybe_emit_at(&mut state, noon()).await);
        assert_eq!(state.window.cycle_count, 0);
        assert!(state.voltage_1.is_empty());
    }

    #[tokio::test]
    async fn test_failed_upload_still_resets() {
        let mut uploader = MockReportUploader::new();
        uploader.expect_upload().times(1).returning(|_| {
            Err(UploadError::Status {
                status: 400,
                body: "Bad request 400: Invalid system id".to_string(),
            })
        });
        let emitter = ReportEmitter::new(1, 60, chrono_tz::UTC, false, Some(Box::new(uploader)));

        let mut state = state(1, &[100.0], &[], &[]);
        assert!(emitter.maybe_emit_at(&mut state, noon()).await);
        assert!(state.generation.is_empty());
        assert_eq!(state.window.cycle_count, 0);
    }

    #[tokio::test]
    async fn test_dry_run_emits() {
        let emitter = ReportEmitter::new(1, 60, chrono_tz::UTC, false, None);
        let mut state = state(3, &[100.0], &[], &[]);
        assert!(emitter.maybe_emit_at(&mut state, noon()).await);
        assert_eq!(state.window.cycle_count, 0);
    }

    #[test]
    fn test_voltage_combination() {
        let emitter = ReportEmitter::new(1, 60, chrono_tz::UTC, false, None);
        let both = emitter
            .build_payload(&state(1, &[1.0], &[340.0, 360.0], &[370.0]), noon())
            .unwrap();
        assert_eq!(both.voltage, Some(360.0));

        let first_only = emitter
            .build_payload(&state(1, &[1.0], &[340.0], &[]), noon())
            .unwrap();
        assert_eq!(first_only.voltage, Some(340.0));

        let none = emitter.build_payload(&state(1, &[1.0], &[], &[]), noon()).unwrap();
        assert_eq!(none.voltage, None);
    }

    #[test]
    fn test_consumption_only_when_enabled() {
        let mut with_consumption = state(1, &[1.0], &[], &[]);
        with_consumption.consumption = vec![2.0, 4.0];

        let disabled = ReportEmitter::new(1, 60, chrono_tz::UTC, false, None);
        assert_eq!(
            disabled.build_payload(&with_consumption, noon()).unwrap().consumption,
            None
        );

        let enabled = ReportEmitter::new(1, 60, chrono_tz::UTC, true, None);
        assert_eq!(
            enabled.build_payload(&with_consumption, noon()).unwrap().consumption,
            Some(3.0)
        );
        assert_eq!(
            enabled
                .build_payload(&state(1, &[1.0], &[], &[]), noon())
                .unwrap()
                .consumption,
            None
        );
    }

    #[test]
    fn test_local_time_stamp() {
        // 12:05 UTC is 22:35 in Adelaide (UTC+10:30 in March)
        let emitter = ReportEmitter::new(1, 60, chrono_tz::Australia::Adelaide, false, None);
        let payload = emitter.build_payload(&state(1, &[1.0], &[], &[]), noon()).unwrap();
        assert_eq!(payload.date, "20240309");
        assert_eq!(payload.time, "22:35");

        // 23:30 UTC is already the next day in Adelaide
        let late = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let payload = emitter.build_payload(&state(1, &[1.0], &[], &[]), late).unwrap();
        assert_eq!(payload.date, "20240310");
        assert_eq!(payload.time, "10:00");
    }

    #[test]
    fn test_payload_serialization_omits_missing_fields() {
        let payload = UploadPayload {
            date: "20240309".to_string(),
            time: "12:05".to_string(),
            generation: 2500.5,
            consumption: None,
            voltage: Some(360.0),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"d": "20240309", "t": "12:05", "v2": 2500.5, "v6": 360.0})
        );
    }
}
