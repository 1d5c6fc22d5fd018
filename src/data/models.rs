//! Core domain models for the watcher.
//!
//! Upstream payload shapes live in `data::upstream`; everything here is the
//! internal representation the monitoring loop works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::data::upstream::UpstreamId;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque upstream game key (`gamePk`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&UpstreamId> for GameId {
    fn from(id: &UpstreamId) -> Self {
        Self(id.to_string())
    }
}

/// Numeric keys go back upstream as numbers, anything else as text.
impl From<&GameId> for UpstreamId {
    fn from(id: &GameId) -> Self {
        id.0
            .parse::<u64>()
            .map(UpstreamId::Number)
            .unwrap_or_else(|_| UpstreamId::Text(id.0.clone()))
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The player being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Game status
// =============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Preview,
    Live,
    Final,
    Completed,
    Cancelled,
}

impl GameStatus {
    /// Map the upstream `abstractGameState` / `detailedState` pair.
    ///
    /// Unknown abstract states map to `Preview` so an odd payload never ends
    /// the day early.
    pub fn from_upstream(abstract_state: &str, detailed_state: &str) -> Self {
        let detailed = detailed_state.to_ascii_lowercase();
        if ["cancel", "postpon", "suspend"]
            .iter()
            .any(|marker| detailed.contains(marker))
        {
            return Self::Cancelled;
        }

        match abstract_state.to_ascii_lowercase().as_str() {
            "live" => Self::Live,
            "final" if detailed.starts_with("completed") => Self::Completed,
            "final" => Self::Final,
            _ => Self::Preview,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final | Self::Completed | Self::Cancelled)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preview => "Preview",
            Self::Live => "Live",
            Self::Final => "Final",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Game record
// =============================================================================

/// One of today's games for the followed team.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub id: GameId,
    pub status: GameStatus,
    pub detailed_state: String,
    pub link: String,
    pub start_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    /// Set the first time the game is seen Live, so the transition is logged once.
    pub was_live: bool,
}

impl GameRecord {
    /// "Away @ Home".
    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a refreshed status. Returns the change, if any.
    pub fn apply_status(&mut self, status: GameStatus, detailed_state: String) -> Option<StatusChange> {
        self.detailed_state = detailed_state;
        if status == self.status {
            return None;
        }
        let change = StatusChange {
            game_id: self.id.clone(),
            from: self.status,
            to: status,
        };
        self.status = status;
        Some(change)
    }
}

/// A status transition observed by the status updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub game_id: GameId,
    pub from: GameStatus,
    pub to: GameStatus,
}

impl StatusChange {
    pub fn became_live(&self) -> bool {
        !self.from.is_live() && self.to.is_live()
    }

    pub fn became_terminal(&self) -> bool {
        !self.from.is_terminal() && self.to.is_terminal()
    }
}

// =============================================================================
// Notification event
// =============================================================================

/// "Player entered" event handed to the notifier. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub event_id: Uuid,
    pub game_id: GameId,
    pub player_id: String,
    pub player_name: String,
    pub matchup: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        game_id: GameId,
        player: &PlayerIdentity,
        matchup: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            game_id,
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            matchup,
            timestamp,
        }
    }

    /// Matchup text for a game that may not be in today's schedule.
    pub fn matchup_for(game: Option<&GameRecord>, game_id: &GameId) -> String {
        match game {
            Some(g) => g.matchup(),
            None => format!("Game #{game_id}"),
        }
    }

    /// Short text suitable for SMS.
    pub fn message_body(&self) -> String {
        format!(
            "{} has entered the game! ({})",
            self.player_name, self.matchup
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
