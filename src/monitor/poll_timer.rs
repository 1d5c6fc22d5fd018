//! Fixed-interval poll timer.
//!
//! Ticks never overlap: the owner awaits each tick's work before asking for
//! the next one, and ticks missed meanwhile are skipped rather than queued.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

pub struct PollTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl PollTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Start ticking. The first tick fires immediately.
    ///
    /// Returns false (and changes nothing) when already running.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            debug!("Poll timer already running");
            return false;
        }
        let mut interval = interval_at(Instant::now(), self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
        info!(period_ms = self.period.as_millis() as u64, "Polling started");
        true
    }

    /// Stop ticking. Safe to call when not running.
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            info!("Polling stopped");
        }
    }

    /// Wait for the next tick. Pending forever while stopped, which makes it
    /// usable as a `select!` branch.
    pub async fn next_tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
