//! Periodic driver: calls [Scheduler::run] once per control period.
//!
//! The scheduler is single-threaded (`!Send`), so the async loops here run on
//! the task that awaits them: a current-thread runtime or a `LocalSet`.

use std::future::Future;
use std::time::{Duration, Instant};

use cadence_kernel::{Scheduler, TickReport};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{ConfigError, DriverConfig, RuntimeConfig};

/// Counters accumulated across driven ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub ticks: u64,
    /// Ticks whose `run` took longer than the period.
    pub overruns: u64,
    pub longest_tick: Duration,
    pub last_report: Option<TickReport>,
}

pub struct PeriodicDriver {
    scheduler: Scheduler,
    config: DriverConfig,
    stats: DriverStats,
}

impl PeriodicDriver {
    pub fn new(scheduler: Scheduler, config: DriverConfig) -> Self {
        Self {
            scheduler,
            config,
            stats: DriverStats::default(),
        }
    }

    /// Validates `config` and applies its initial enabled state.
    pub fn from_config(
        mut scheduler: Scheduler,
        config: &RuntimeConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        scheduler.set_enabled(config.driver.start_enabled);
        Ok(Self::new(scheduler, config.driver.clone()))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Runs one tick now, outside any timer.
    pub fn step(&mut self) -> TickReport {
        let started = Instant::now();
        let report = self.scheduler.run();
        let elapsed = started.elapsed();

        self.stats.ticks += 1;
        self.stats.longest_tick = self.stats.longest_tick.max(elapsed);
        let period = self.config.period();
        if elapsed > period {
            self.stats.overruns += 1;
            if self.config.overrun_warning {
                tracing::warn!(
                    tick = report.tick,
                    elapsed_us = elapsed.as_micros() as u64,
                    period_ms = self.config.period_ms,
                    "loop overrun"
                );
            }
        }
        self.stats.last_report = Some(report.clone());
        report
    }

    /// Drives exactly `ticks` ticks, one per period.
    pub async fn run_for(&mut self, ticks: u64) -> DriverStats {
        let mut interval = self.interval();
        for _ in 0..ticks {
            interval.tick().await;
            self.step();
        }
        self.stats.clone()
    }

    /// Drives ticks until `stop` completes. A tick in progress is never cut short.
    pub async fn run_until<F>(&mut self, stop: F) -> DriverStats
    where
        F: Future<Output = ()>,
    {
        let mut interval = self.interval();
        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = interval.tick() => {
                    self.step();
                }
            }
        }
        tracing::debug!(ticks = self.stats.ticks, overruns = self.stats.overruns, "driver stopped");
        self.stats.clone()
    }

    fn interval(&self) -> time::Interval {
        let mut interval = time::interval(self.config.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }
}
