//! Notification fan-out.
//!
//! Every channel is attempted concurrently, and each channel attempts every
//! recipient concurrently. Failures are logged one by one and collected; the
//! batch never aborts early.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::data::models::NotificationEvent;

use super::NotifyError;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &NotificationEvent) -> DeliveryReport;
}

#[derive(Debug)]
pub struct DeliveryFailure {
    pub channel: String,
    pub target: String,
    pub error: NotifyError,
}

/// Outcome of one notification batch: how many sends were tried, which failed.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Build a report from per-target results of one channel.
    pub fn from_results(
        channel: &str,
        results: impl IntoIterator<Item = (String, Result<(), NotifyError>)>,
    ) -> Self {
        let mut report = Self::default();
        for (target, result) in results {
            report.attempted += 1;
            if let Err(error) = result {
                report.failures.push(DeliveryFailure {
                    channel: channel.to_string(),
                    target,
                    error,
                });
            }
        }
        report
    }

    pub fn delivered(&self) -> usize {
        self.attempted.saturating_sub(self.failures.len())
    }

    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.add_channel(channel);
        self
    }

    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        info!(channel = channel.name(), "Notification channel registered");
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[instrument(skip_all, fields(event_id = %event.event_id, game_id = %event.game_id))]
    pub async fn notify(&self, event: &NotificationEvent) -> DeliveryReport {
        info!(
            player = %event.player_name,
            matchup = %event.matchup,
            "{}",
            event.message_body()
        );

        if self.channels.is_empty() {
            warn!("No notification channels configured, alert logged only");
            return DeliveryReport::default();
        }

        let reports = join_all(self.channels.iter().map(|c| c.deliver(event))).await;
        let mut report = DeliveryReport::default();
        for r in reports {
            report.merge(r);
        }

        for failure in &report.failures {
            error!(
                channel = %failure.channel,
                target = %failure.target,
                error = %failure.error,
                "Notification delivery failed"
            );
        }
        info!(
            attempted = report.attempted,
            delivered = report.delivered(),
            failed = report.failures.len(),
            "Notification batch complete"
        );

        report
    }
}

// =============================================================================
// Tests
// =============================================================================
