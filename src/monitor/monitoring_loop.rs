//! Monitoring loop.
//!
//! Owns the day's `WatchState` and drives it through
//! Idle -> Armed -> Polling -> Done. Timing lives in the daily scheduler;
//! this type only decides what each step does.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::StatsApi;
use crate::data::models::{GameId, NotificationEvent, StatusChange};
use crate::data::{schedule, status};
use crate::detection::entry_detector::EntryDetector;
use crate::notify::notifier::Notifier;
use crate::state::watch_state::{Phase, WatchState};

use super::audit_log::{AuditEntry, AuditHandle};

pub type StatusObserver = Box<dyn Fn(&StatusChange) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub sport_id: String,
    pub team_id: String,
    pub stop_after_entry: bool,
    /// Wait for first pitch (minus `pre_game_lead`) before polling.
    pub scheduled_games_only: bool,
    pub pre_game_lead: chrono::Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            sport_id: "14".to_string(),
            team_id: String::new(),
            stop_after_entry: true,
            scheduled_games_only: true,
            pre_game_lead: chrono::Duration::zero(),
        }
    }
}

/// What a poll tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not polling; nothing was fetched.
    Skipped,
    /// Idle in unscheduled mode; the schedule was fetched again and had no games.
    NoGames,
    Polled {
        changes: Vec<StatusChange>,
        entries: Vec<NotificationEvent>,
    },
    /// The day's watch is finished.
    Done,
}

pub struct MonitoringLoop {
    api: Arc<dyn StatsApi>,
    detector: EntryDetector,
    notifier: Notifier,
    audit: Option<AuditHandle>,
    config: LoopConfig,
    state: WatchState,
    observers: Vec<StatusObserver>,
}

impl MonitoringLoop {
    pub fn new(
        api: Arc<dyn StatsApi>,
        detector: EntryDetector,
        notifier: Notifier,
        config: LoopConfig,
        today: NaiveDate,
    ) -> Self {
        Self {
            api,
            detector,
            notifier,
            audit: None,
            config,
            state: WatchState::new_day(today),
            observers: Vec::new(),
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Register a callback for every game status change.
    pub fn on_status_change<F>(&mut self, observer: F)
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Unscheduled mode keeps re-fetching the schedule until games show up.
    pub fn polls_while_idle(&self) -> bool {
        !self.config.scheduled_games_only
            && self.state.phase() == Phase::Idle
            && self.state.games().is_empty()
    }

    /// Discard everything about the previous day.
    pub fn begin_day(&mut self, day: NaiveDate) {
        if self.state.day() != day || self.state.phase() != Phase::Idle {
            info!(%day, previous_phase = %self.state.phase(), "Starting new watch day");
        }
        self.state = WatchState::new_day(day);
    }

    /// Fetch today's games and arm if there are any.
    #[instrument(skip(self), fields(day = %self.state.day(), team_id = %self.config.team_id))]
    pub async fn check_for_games_today(&mut self, now: DateTime<Utc>) -> Phase {
        let games = schedule::fetch_games_for_team(
            self.api.as_ref(),
            &self.config.sport_id,
            self.state.day(),
            &self.config.team_id,
        )
        .await;

        if games.is_empty() {
            info!("No games scheduled today");
            return self.state.phase();
        }

        info!(count = games.len(), "Found games today");
        self.state.set_games(games);
        self.arm(now)
    }

    /// Decide when polling starts for the games already loaded.
    ///
    /// Polling begins at the first start time minus the pre-game lead, or
    /// right away when that moment has passed or scheduled-only is off.
    pub fn arm(&mut self, now: DateTime<Utc>) -> Phase {
        let Some(first_start) = self.state.games().iter().map(|g| g.start_time).min() else {
            return self.state.phase();
        };

        let poll_at = if self.config.scheduled_games_only {
            first_start - self.config.pre_game_lead
        } else {
            now
        };

        if poll_at <= now {
            info!(first_start = %first_start, "Game time reached, polling now");
            self.state.set_phase(Phase::Polling);
        } else {
            info!(
                poll_at = %poll_at,
                wait_minutes = (poll_at - now).num_minutes(),
                "Waiting for game time"
            );
            self.state.set_phase(Phase::Armed { poll_at });
        }
        self.state.phase()
    }

    /// Armed -> Polling once the countdown expires. False in any other phase.
    pub fn begin_polling(&mut self) -> bool {
        match self.state.phase() {
            Phase::Armed { .. } => {
                self.state.set_phase(Phase::Polling);
                info!("Countdown finished, polling");
                true
            }
            _ => false,
        }
    }

    pub fn force_done(&mut self, reason: &str) {
        if self.state.is_done() {
            return;
        }
        info!(reason, phase = %self.state.phase(), "Ending today's watch");
        self.state.set_phase(Phase::Done);
    }

    /// One poll cycle.
    #[instrument(skip_all, fields(day = %self.state.day()))]
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        match self.state.phase() {
            Phase::Polling => {}
            Phase::Done => return TickOutcome::Done,
            Phase::Idle if self.polls_while_idle() => {
                if self.check_for_games_today(now).await != Phase::Polling {
                    return TickOutcome::NoGames;
                }
            }
            _ => return TickOutcome::Skipped,
        }

        if self.state.player_in_game() && self.config.stop_after_entry {
            info!("Player already entered, stopping for today");
            self.state.set_phase(Phase::Done);
            return TickOutcome::Done;
        }

        let changes = status::refresh_statuses(self.api.as_ref(), self.state.games_mut()).await;
        for change in &changes {
            debug!(game_id = %change.game_id, from = %change.from, to = %change.to, "Status change");
            for observer in &self.observers {
                observer(change);
            }
        }

        let mut entries = Vec::new();
        if self.state.has_live_game() {
            let live: Vec<(GameId, String)> = self
                .state
                .games()
                .iter()
                .filter(|g| g.is_live())
                .map(|g| (g.id.clone(), g.link.clone()))
                .collect();

            for (game_id, link) in live {
                let entered = self
                    .detector
                    .check(self.api.as_ref(), &mut self.state, &game_id, &link)
                    .await;
                if entered {
                    entries.push(self.announce(game_id, now).await);
                }
            }
        } else if self.state.all_terminal() {
            info!("All games finished for today");
            self.state.set_phase(Phase::Done);
            return TickOutcome::Done;
        }

        TickOutcome::Polled { changes, entries }
    }

    async fn announce(&self, game_id: GameId, now: DateTime<Utc>) -> NotificationEvent {
        let matchup = NotificationEvent::matchup_for(self.state.game(&game_id), &game_id);
        let event = NotificationEvent::new(game_id, self.detector.player(), matchup, now);

        let report = self.notifier.notify(&event).await;
        if !report.all_delivered() {
            warn!(
                failed = report.failures.len(),
                attempted = report.attempted,
                "Some notifications were not delivered"
            );
        }

        if let Some(audit) = &self.audit {
            audit.record(self.state.day(), AuditEntry::from(&event));
        }
        event
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeStatsApi;
    use crate::data::models::{GameStatus, PlayerIdentity};
    use crate::data::upstream::UpstreamId;
    use crate::monitor::audit_log::{log_path, read_entries, AuditLog};
    use crate::notify::notifier::{DeliveryReport, NotificationChannel};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    const SCENARIO: &str = r#"{"dates":[{"games":[{"gamePk":123,
        "status":{"abstractGameState":"Preview"},
        "teams":{"home":{"team":{"id":"436","name":"A"}},"away":{"team":{"id":"9","name":"B"}}},
        "gameDate":"2024-05-01T23:05:00Z","link":"/game/123"}]}]}"#;

    const DOUBLEHEADER: &str = r#"{"dates":[{"games":[
        {"gamePk":1,"status":{"abstractGameState":"Preview"},"link":"/game/1",
         "teams":{"home":{"team":{"id":436,"name":"A"}},"away":{"team":{"id":9,"name":"B"}}},
         "gameDate":"2024-05-01T16:05:00Z"},
        {"gamePk":2,"status":{"abstractGameState":"Preview"},"link":"/game/2",
         "teams":{"home":{"team":{"id":436,"name":"A"}},"away":{"team":{"id":9,"name":"B"}}},
         "gameDate":"2024-05-01T20:05:00Z"}]}]}"#;

    const AT_BAT: &str = r#"{"teams":{"home":{"players":{"ID123456":{
        "person":{"id":123456},"stats":{"batting":{"atBats":1}}}}},"away":{}}}"#;
    const EMPTY_BOX: &str = r#"{"teams":{"home":{},"away":{}}}"#;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<NotificationEvent>>,
    }

    struct RecordingChannel(Arc<Recorder>);

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn deliver(&self, event: &NotificationEvent) -> DeliveryReport {
            self.0.events.lock().unwrap().push(event.clone());
            DeliveryReport::from_results("recorder", [("test".to_string(), Ok(()))])
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn build(api: &Arc<FakeStatsApi>, config: LoopConfig) -> (MonitoringLoop, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new().with_channel(Box::new(RecordingChannel(recorder.clone())));
        let detector = EntryDetector::new(PlayerIdentity {
            id: "123456".into(),
            name: "John Smith".into(),
        });
        let api: Arc<dyn StatsApi> = api.clone();
        (
            MonitoringLoop::new(api, detector, notifier, config, day()),
            recorder,
        )
    }

    fn config() -> LoopConfig {
        LoopConfig {
            team_id: "436".into(),
            ..LoopConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scenario_arms_at_start_time() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        let (mut monitor, _) = build(&api, config());

        let phase = monitor.check_for_games_today(at(13, 0)).await;

        assert_eq!(phase, Phase::Armed { poll_at: at(23, 5) });
        assert_eq!(monitor.state().games().len(), 1);
        assert_eq!(monitor.state().games()[0].id, GameId::new("123"));
        assert_eq!(monitor.state().games()[0].status, GameStatus::Preview);
    }

    #[tokio::test]
    async fn test_pre_game_lead_moves_poll_start() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        let (mut monitor, _) = build(
            &api,
            LoopConfig {
                pre_game_lead: chrono::Duration::minutes(30),
                ..config()
            },
        );

        let phase = monitor.check_for_games_today(at(13, 0)).await;
        assert_eq!(phase, Phase::Armed { poll_at: at(22, 35) });
    }

    #[tokio::test]
    async fn test_polls_immediately_when_game_already_started() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        let (mut monitor, _) = build(&api, config());

        assert_eq!(monitor.check_for_games_today(at(23, 30)).await, Phase::Polling);
    }

    #[tokio::test]
    async fn test_unscheduled_mode_polls_immediately() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        let (mut monitor, _) = build(
            &api,
            LoopConfig {
                scheduled_games_only: false,
                ..config()
            },
        );

        assert_eq!(monitor.check_for_games_today(at(9, 0)).await, Phase::Polling);
    }

    #[tokio::test]
    async fn test_no_games_stays_idle() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(r#"{"dates":[]}"#);
        let (mut monitor, _) = build(&api, config());

        assert_eq!(monitor.check_for_games_today(at(9, 0)).await, Phase::Idle);
        assert!(!monitor.polls_while_idle());
        assert_eq!(monitor.tick(at(9, 1)).await, TickOutcome::Skipped);
        assert_eq!(api.calls(), vec!["schedule:14".to_string()]);
    }

    #[tokio::test]
    async fn test_unscheduled_mode_refetches_schedule_until_it_recovers() {
        let api = Arc::new(FakeStatsApi::new());
        let (mut monitor, recorder) = build(
            &api,
            LoopConfig {
                scheduled_games_only: false,
                ..config()
            },
        );

        // Schedule endpoint fails at the daily check.
        assert_eq!(monitor.check_for_games_today(at(9, 0)).await, Phase::Idle);
        assert!(monitor.polls_while_idle());
        assert_eq!(monitor.tick(at(9, 1)).await, TickOutcome::NoGames);
        assert_eq!(api.calls(), vec!["schedule:14".to_string(); 2]);

        api.set_schedule(SCENARIO);
        api.set_status("123", "Live", "In Progress");
        api.set_boxscore("123", AT_BAT);

        let TickOutcome::Polled { changes, entries } = monitor.tick(at(9, 2)).await else {
            panic!("expected a poll once the schedule recovers");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(entries.len(), 1);
        assert!(!monitor.polls_while_idle());
        assert_eq!(monitor.state().phase(), Phase::Polling);
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
        assert_eq!(
            api.calls().iter().filter(|c| c.starts_with("schedule")).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_countdown_then_polling() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        let (mut monitor, _) = build(&api, config());
        monitor.check_for_games_today(at(13, 0)).await;

        assert_eq!(monitor.tick(at(14, 0)).await, TickOutcome::Skipped);
        assert!(monitor.begin_polling());
        assert!(!monitor.begin_polling());
        assert_eq!(monitor.state().phase(), Phase::Polling);
    }

    #[tokio::test]
    async fn test_only_live_game_is_checked_and_done_when_all_final() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(DOUBLEHEADER);
        api.set_status("1", "Final", "Final");
        api.set_status("2", "Live", "In Progress");
        api.set_boxscore("2", EMPTY_BOX);
        api.set_live_feed("2", r#"{"liveData":{"plays":{"allPlays":[]}}}"#);
        let (mut monitor, recorder) = build(&api, config());
        monitor.check_for_games_today(at(21, 0)).await;

        let TickOutcome::Polled { changes, entries } = monitor.tick(at(21, 0)).await else {
            panic!("expected a poll");
        };
        assert_eq!(changes.len(), 2);
        assert!(entries.is_empty());
        assert_eq!(api.calls_for("1"), 1);

        // Game 1 is terminal now and is no longer fetched at all.
        monitor.tick(at(21, 1)).await;
        assert_eq!(api.calls_for("1"), 1);
        assert!(api.calls().contains(&"boxscore:2".to_string()));

        api.set_status("2", "Final", "Final");
        assert_eq!(monitor.tick(at(21, 2)).await, TickOutcome::Done);
        assert!(monitor.state().is_done());
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entry_notifies_then_next_tick_stops_without_calls() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::spawn(dir.path());

        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        api.set_status("123", "Live", "In Progress");
        api.set_boxscore("123", AT_BAT);
        let (monitor, recorder) = build(&api, config());
        let mut monitor = monitor.with_audit(audit.handle());
        monitor.check_for_games_today(at(23, 10)).await;

        let TickOutcome::Polled { entries, .. } = monitor.tick(at(23, 40)).await else {
            panic!("expected a poll");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].matchup, "B @ A");
        assert!(monitor.state().player_in_game());
        assert!(monitor.state().is_confirmed(&GameId::new("123")));

        let calls_before = api.calls().len();
        assert_eq!(monitor.tick(at(23, 41)).await, TickOutcome::Done);
        assert_eq!(api.calls().len(), calls_before);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].message_body(),
            "John Smith has entered the game! (B @ A)"
        );

        drop(monitor);
        audit.close().await;
        let logged = read_entries(&log_path(dir.path(), day())).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].game_id, UpstreamId::Number(123));
        assert_eq!(logged[0].timestamp, at(23, 40));
    }

    #[tokio::test]
    async fn test_keeps_polling_without_duplicate_alerts() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        api.set_status("123", "Live", "In Progress");
        api.set_boxscore("123", AT_BAT);
        let (mut monitor, recorder) = build(
            &api,
            LoopConfig {
                stop_after_entry: false,
                ..config()
            },
        );
        monitor.check_for_games_today(at(23, 10)).await;

        monitor.tick(at(23, 40)).await;
        let second = monitor.tick(at(23, 41)).await;
        assert_eq!(
            second,
            TickOutcome::Polled {
                changes: vec![],
                entries: vec![]
            }
        );
        assert_eq!(monitor.state().phase(), Phase::Polling);
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_observers_see_every_change() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        api.set_status("123", "Live", "In Progress");
        api.set_boxscore("123", EMPTY_BOX);
        let (mut monitor, _) = build(&api, config());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        monitor.on_status_change(move |c| sink.lock().unwrap().push(c.clone()));
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        monitor.on_status_change(move |_| *counter.lock().unwrap() += 1);

        monitor.check_for_games_today(at(23, 10)).await;
        monitor.tick(at(23, 10)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].became_live());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_force_done_and_new_day_reset() {
        let api = Arc::new(FakeStatsApi::new());
        api.set_schedule(SCENARIO);
        api.set_status("123", "Live", "In Progress");
        api.set_boxscore("123", AT_BAT);
        let (mut monitor, _) = build(&api, config());
        monitor.check_for_games_today(at(23, 10)).await;
        monitor.tick(at(23, 10)).await;

        monitor.force_done("end of day");
        assert!(monitor.state().is_done());

        let tomorrow = day().succ_opt().unwrap();
        monitor.begin_day(tomorrow);
        assert_eq!(monitor.state().day(), tomorrow);
        assert_eq!(monitor.state().phase(), Phase::Idle);
        assert!(!monitor.state().player_in_game());
        assert_eq!(monitor.state().confirmed_games().count(), 0);
    }
}
