// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Drift-corrected periodic scheduler
//!
//! The [`Scheduler`] runs a [`ScheduledTask`] on a fixed cadence until its
//! shutdown channel flips to `true`. It sleeps until an absolute deadline, runs
//! the task to completion, then moves the deadline forward by whole intervals:
//!
//! ```text
//! next += floor((now - next) / interval) * interval + interval
//! ```
//!
//! A cycle that overruns skips the ticks it missed instead of running them back
//! to back, and every deadline stays on the phase grid set at start-up.
//!
//! Errors and panics raised by a cycle are logged and swallowed, the loop keeps
//! going.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Work driven by the [`Scheduler`], one call per tick.
#[async_trait]
pub trait ScheduledTask: Send {
    async fn run_cycle(&mut self) -> anyhow::Result<()>;
}

/// Deadline following `next` once a cycle has finished at `now`.
///
/// The result is strictly after `now` and differs from `next` by a whole
/// number of intervals. A zero interval degenerates to `now`.
pub fn advance_deadline(next: Instant, now: Instant, interval: Duration) -> Instant {
    if interval.is_zero() {
        return now;
    }
    let late = now.saturating_duration_since(next);
    let missed = late.as_nanos() / interval.as_nanos();
    if missed > 0 {
        debug!("Cycle overran, skipping {} tick(s)", missed);
    }
    let missed = u32::try_from(missed).unwrap_or(u32::MAX);
    next + interval.saturating_mul(missed) + interval
}

/// Periodic driver for a single task.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run `task` every interval until `shutdown` holds `true` or its sender is dropped.
    ///
    /// The first cycle runs one interval after the call. A shutdown requested
    /// during a cycle takes effect once that cycle has returned. Returns the
    /// number of cycles run.
    pub async fn run<T>(&self, task: &mut T, mut shutdown: watch::Receiver<bool>) -> u64
    where
        T: ScheduledTask + ?Sized,
    {
        let mut next = Instant::now() + self.interval;
        let mut cycles = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = time::sleep_until(next) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match AssertUnwindSafe(task.run_cycle()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Cycle failed: {:#}", e),
                Err(panic) => error!("Cycle panicked: {}", panic_message(panic.as_ref())),
            }
            cycles += 1;

            next = advance_deadline(next, Instant::now(), self.interval);
        }

        info!("Scheduler stopped after {} cycle(s)", cycles);
        cycles
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    /// Records the start of each cycle and requests shutdown after `limit` cycles.
    struct Recorder {
        origin: Instant,
        starts: Vec<Duration>,
        work: Duration,
        limit: usize,
        fail_first: bool,
        panic_first: bool,
        shutdown: watch::Sender<bool>,
    }

    impl Recorder {
        fn new(limit: usize, shutdown: watch::Sender<bool>) -> Self {
            Self {
                origin: Instant::now(),
                starts: Vec::new(),
                work: Duration::ZERO,
                limit,
                fail_first: false,
                panic_first: false,
                shutdown,
            }
        }
    }

    #[async_trait]
    impl ScheduledTask for Recorder {
        async fn run_cycle(&mut self) -> anyhow::Result<()> {
            self.starts.push(Instant::now() - self.origin);
            let first = self.starts.len() == 1;
            if self.starts.len() >= self.limit {
                let _ = self.shutdown.send(true);
            }
            if first && self.panic_first {
                panic!("first cycle exploded");
            }
            time::sleep(self.work).await;
            if first && self.fail_first {
                anyhow::bail!("first cycle failed");
            }
            Ok(())
        }
    }

    fn secs(starts: &[Duration]) -> Vec<u64> {
        starts.iter().map(Duration::as_secs).collect()
    }

    #[test]
    fn test_advance_deadline_on_time() {
        let next = Instant::now();
        let now = next + Duration::from_secs(2);
        assert_eq!(advance_deadline(next, now, INTERVAL), next + INTERVAL);
    }

    #[test]
    fn test_advance_deadline_skips_missed_ticks() {
        let next = Instant::now();
        let now = next + Duration::from_secs(25);
        let advanced = advance_deadline(next, now, INTERVAL);
        assert_eq!(advanced, next + Duration::from_secs(30));
        assert!(advanced > now);
    }

    #[test]
    fn test_advance_deadline_exact_multiple() {
        let next = Instant::now();
        let now = next + Duration::from_secs(20);
        let advanced = advance_deadline(next, now, INTERVAL);
        assert!(advanced > now);
        assert_eq!(advanced - next, Duration::from_secs(30));
    }

    #[test]
    fn test_advance_deadline_before_deadline() {
        let now = Instant::now();
        let next = now + Duration::from_secs(3);
        assert_eq!(advance_deadline(next, now, INTERVAL), next + INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_cadence() {
        let (tx, rx) = watch::channel(false);
        let mut task = Recorder::new(3, tx);
        task.work = Duration::from_secs(1);
        let cycles = Scheduler::new(INTERVAL).run(&mut task, rx).await;
        assert_eq!(cycles, 3);
        assert_eq!(secs(&task.starts), vec![10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_do_not_burst() {
        let (tx, rx) = watch::channel(false);
        let mut task = Recorder::new(3, tx);
        task.work = Duration::from_secs(25);
        Scheduler::new(INTERVAL).run(&mut task, rx).await;
        // 10 + 25 = 35 -> next tick on the grid is 40, then 40 + 25 = 65 -> 70
        assert_eq!(secs(&task.starts), vec![10, 40, 70]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_panics_do_not_stop_the_loop() {
        let (tx, rx) = watch::channel(false);
        let mut task = Recorder::new(2, tx);
        task.fail_first = true;
        assert_eq!(Scheduler::new(INTERVAL).run(&mut task, rx).await, 2);

        let (tx, rx) = watch::channel(false);
        let mut task = Recorder::new(2, tx);
        task.panic_first = true;
        assert_eq!(Scheduler::new(INTERVAL).run(&mut task, rx).await, 2);
        assert_eq!(secs(&task.starts), vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_sleeping() {
        let (tx, rx) = watch::channel(false);
        let (unused_tx, _unused_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut task = Recorder::new(usize::MAX, unused_tx);
            Scheduler::new(INTERVAL).run(&mut task, rx).await
        });
        time::sleep(Duration::from_secs(5)).await;
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_the_loop() {
        let (tx, rx) = watch::channel(false);
        let (unused_tx, _unused_rx) = watch::channel(false);
        drop(tx);
        let mut task = Recorder::new(usize::MAX, unused_tx);
        assert_eq!(Scheduler::new(INTERVAL).run(&mut task, rx).await, 0);
    }
}
