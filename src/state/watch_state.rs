//! Per-day watch state.
//!
//! Owned by the monitoring loop and replaced wholesale at each day boundary
//! through `WatchState::new_day`; there is no partial reset.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt;

use crate::data::models::{GameId, GameRecord};

/// Where the day's watch currently stands. Being an enum, at most one of
/// armed, polling and done can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No games today, or the day has not been checked yet.
    Idle,
    /// Games found; polling begins at `poll_at`.
    Armed { poll_at: DateTime<Utc> },
    Polling,
    /// Today's games are fully processed.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Armed { poll_at } => write!(f, "armed (polling at {poll_at})"),
            Self::Polling => f.write_str("polling"),
            Self::Done => f.write_str("done"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchState {
    day: NaiveDate,
    phase: Phase,
    games: Vec<GameRecord>,
    player_in_game: bool,
    confirmed_games: HashSet<GameId>,
}

impl WatchState {
    pub fn new_day(day: NaiveDate) -> Self {
        Self {
            day,
            phase: Phase::Idle,
            games: Vec::new(),
            player_in_game: false,
            confirmed_games: HashSet::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    // =========================================================================
    // Games
    // =========================================================================

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub(crate) fn games_mut(&mut self) -> &mut [GameRecord] {
        &mut self.games
    }

    pub(crate) fn set_games(&mut self, games: Vec<GameRecord>) {
        self.games = games;
    }

    pub fn game(&self, id: &GameId) -> Option<&GameRecord> {
        self.games.iter().find(|g| &g.id == id)
    }

    pub fn has_live_game(&self) -> bool {
        self.games.iter().any(GameRecord::is_live)
    }

    pub fn all_terminal(&self) -> bool {
        self.games.iter().all(GameRecord::is_terminal)
    }

    // =========================================================================
    // Player tracking
    // =========================================================================

    pub fn player_in_game(&self) -> bool {
        self.player_in_game
    }

    pub fn is_confirmed(&self, game_id: &GameId) -> bool {
        self.confirmed_games.contains(game_id)
    }

    pub fn confirmed_games(&self) -> impl Iterator<Item = &GameId> {
        self.confirmed_games.iter()
    }

    /// Record participation evidence for `game_id`.
    ///
    /// Returns true only when the player was not yet known to be in a game,
    /// i.e. this is the day's entry. The game is confirmed either way, so a
    /// confirmed game can never alert again today.
    pub fn record_participation(&mut self, game_id: &GameId) -> bool {
        let newly_entered = !self.player_in_game;
        self.player_in_game = true;
        self.confirmed_games.insert(game_id.clone());
        newly_entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_new_day_is_idle_and_empty() {
        let state = WatchState::new_day(day());
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.player_in_game());
        assert!(state.games().is_empty());
        assert_eq!(state.confirmed_games().count(), 0);
        assert!(state.all_terminal());
    }

    #[test]
    fn test_flag_goes_true_once() {
        let mut state = WatchState::new_day(day());
        assert!(state.record_participation(&GameId::new("1")));
        assert!(!state.record_participation(&GameId::new("1")));
        assert!(!state.record_participation(&GameId::new("2")));
        assert!(state.player_in_game());
        assert!(state.is_confirmed(&GameId::new("2")));
    }

    #[test]
    fn test_new_day_clears_everything() {
        let mut state = WatchState::new_day(day());
        state.record_participation(&GameId::new("1"));
        state.set_phase(Phase::Done);

        let next = WatchState::new_day(day().succ_opt().unwrap());
        assert_eq!(next.phase(), Phase::Idle);
        assert!(!next.player_in_game());
        assert!(!next.is_confirmed(&GameId::new("1")));
    }
}
