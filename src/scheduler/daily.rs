//! Daily scheduler.
//!
//! Single-task event loop that owns every timer of a watch day: the daily
//! check, the countdown to polling, the poll timer and the end-of-day
//! deadline. Each branch is awaited to completion before the next is polled,
//! so ticks are serialized.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::monitor::monitoring_loop::{MonitoringLoop, TickOutcome};
use crate::monitor::poll_timer::PollTimer;
use crate::state::watch_state::Phase;

use super::clock::{Clock, SystemClock};

/// Longest DST gap searched when a wall-clock time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Resolve a local wall-clock time to an instant. Ambiguous times take the
/// earlier instant; times inside a DST gap move to the first valid minute.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    for minute in 0..=MAX_GAP_MINUTES {
        let candidate = local + chrono::Duration::minutes(minute);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => continue,
        }
    }
    // No zone has a gap this long; treat the wall time as UTC.
    Utc.from_utc_datetime(&local)
}

/// Next instant strictly after `now` at which the local clock reads `at`.
pub fn next_daily_check(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let today = local_date(now, tz);
    let candidate = resolve_local(tz, today.and_time(at));
    if candidate > now {
        return candidate;
    }
    resolve_local(tz, next_day(today).and_time(at))
}

/// The next local midnight after `now`.
pub fn end_of_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    resolve_local(tz, next_day(local_date(now, tz)).and_time(NaiveTime::MIN))
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(NaiveDate::MAX)
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

async fn sleep_until(clock: &dyn Clock, at: Option<DateTime<Utc>>) {
    match at {
        Some(at) => tokio::time::sleep(until(at, clock.now())).await,
        None => std::future::pending::<()>().await,
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub timezone: Tz,
    pub check_time: NaiveTime,
    pub poll_interval: Duration,
    /// Run the day's check immediately instead of waiting for `check_time`.
    pub check_at_startup: bool,
}

pub struct DailyScheduler {
    config: SchedulerConfig,
    timer: PollTimer,
    clock: Arc<dyn Clock>,
}

impl DailyScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let timer = PollTimer::new(config.poll_interval);
        Self {
            config,
            timer,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn next_check_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_daily_check(now, self.config.timezone, self.config.check_time)
    }

    /// Drive `monitor` until `shutdown` is cancelled.
    pub async fn run(&mut self, monitor: &mut MonitoringLoop, shutdown: CancellationToken) {
        let tz = self.config.timezone;
        let clock = self.clock.clone();
        let mut next_check = if self.config.check_at_startup {
            clock.now()
        } else {
            self.next_check_after(clock.now())
        };
        let mut deadline: Option<DateTime<Utc>> = None;

        info!(
            timezone = %tz,
            check_time = %self.config.check_time,
            next_check = %next_check,
            "Daily scheduler started"
        );

        loop {
            let countdown = match monitor.state().phase() {
                Phase::Armed { poll_at } => Some(poll_at),
                _ => None,
            };

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }

                _ = sleep_until(clock.as_ref(), Some(next_check)) => {
                    let now = clock.now();
                    self.timer.stop();
                    monitor.begin_day(local_date(now, tz));
                    let phase = monitor.check_for_games_today(now).await;
                    let idle_polling = monitor.polls_while_idle();
                    if phase == Phase::Polling || idle_polling {
                        self.timer.start();
                    }
                    deadline = match phase {
                        Phase::Idle if !idle_polling => None,
                        _ => Some(end_of_day(now, tz)),
                    };
                    next_check = self.next_check_after(now);
                    info!(next_check = %next_check, phase = %phase, "Daily check complete");
                }

                _ = sleep_until(clock.as_ref(), countdown) => {
                    if monitor.begin_polling() {
                        self.timer.start();
                    }
                }

                _ = sleep_until(clock.as_ref(), deadline) => {
                    deadline = None;
                    self.timer.stop();
                    monitor.force_done("end of day");
                }

                _ = self.timer.next_tick() => {
                    let outcome = monitor.tick(clock.now()).await;
                    debug!(?outcome, "Poll tick complete");
                    if outcome == TickOutcome::Done || monitor.state().is_done() {
                        self.timer.stop();
                        deadline = None;
                        info!(next_check = %next_check, "Done for today");
                    }
                }
            }
        }

        self.timer.stop();
    }
}
