// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::monitor::MonitorCycle;
use crate::config::Config;
use crate::scheduler::{ScheduledTask, Scheduler};

/// Owns the scheduled tasks and their shared shutdown signal.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            shutdown,
        }
    }

    /// Launch all configured tasks based on configuration
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        self.start_monitor(config)?;
        Ok(())
    }

    /// Start the inverter monitor task
    fn start_monitor(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting inverter monitor for {}:{} ({}), polling every {}s, uploading every {} min",
            config.inverter.address,
            config.inverter.port,
            config.inverter.register_map_file.as_deref().unwrap_or(&config.inverter.model),
            config.acquisition.scan_interval_secs,
            config.acquisition.upload_interval_minutes
        );

        let cycle = MonitorCycle::from_config(config)?;
        self.spawn_scheduled(
            Duration::from_secs(config.acquisition.scan_interval_secs),
            cycle,
        );
        Ok(())
    }

    /// Run `task` on its own scheduler until shutdown.
    pub fn spawn_scheduled<T>(&mut self, interval: Duration, mut task: T)
    where
        T: ScheduledTask + 'static,
    {
        let shutdown = self.shutdown.subscribe();
        let task = tokio::spawn(async move {
            let cycles = Scheduler::new(interval).run(&mut task, shutdown).await;
            debug!("Scheduled task finished after {} cycle(s)", cycles);
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Number of tasks started by this daemon.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop all running tasks
    ///
    /// Each scheduler returns once its current cycle, if any, has finished.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.shutdown.send_replace(true);
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {:#}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        Ok(())
    }
}
