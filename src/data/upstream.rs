//! Response shapes for the MLB stats API (`statsapi.mlb.com/api/v1`).
//!
//! Only the fields the watcher reads are modelled. Every collection defaults
//! to empty so a sparse payload deserializes instead of failing the whole
//! request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Shared
// =============================================================================

/// Upstream ids arrive as numbers from the real API and as strings from some
/// mirrors; accept both and compare as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpstreamId {
    Number(u64),
    Text(String),
}

impl UpstreamId {
    pub fn matches(&self, id: &str) -> bool {
        let id = id.trim();
        match self {
            Self::Number(n) => id.parse::<u64>().map(|v| v == *n).unwrap_or(false),
            Self::Text(s) => s.trim() == id,
        }
    }
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRef {
    #[serde(default)]
    pub id: Option<UpstreamId>,
}

impl PersonRef {
    pub fn is(&self, player_id: &str) -> bool {
        self.id.as_ref().is_some_and(|id| id.matches(player_id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatus {
    #[serde(default)]
    pub abstract_game_state: String,
    #[serde(default)]
    pub detailed_state: String,
}

// =============================================================================
// Schedule
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub dates: Vec<ScheduleDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleDate {
    #[serde(default)]
    pub games: Vec<ScheduleGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleGame {
    pub game_pk: UpstreamId,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub game_date: Option<String>,
    #[serde(default)]
    pub status: UpstreamStatus,
    pub teams: ScheduleTeams,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleTeams {
    pub home: ScheduleSide,
    pub away: ScheduleSide,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleSide {
    pub team: TeamRef,
}

#[derive(Debug, Deserialize)]
pub struct TeamRef {
    pub id: UpstreamId,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Live feed (`/game/{pk}/feed/live`)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveFeed {
    #[serde(default)]
    pub game_data: Option<GameData>,
    #[serde(default)]
    pub live_data: Option<LiveData>,
    /// Some mirrors flatten `liveData.plays` to the top level.
    #[serde(default)]
    pub plays: Option<Plays>,
}

impl LiveFeed {
    pub fn all_plays(&self) -> impl Iterator<Item = &Play> {
        let nested = self
            .live_data
            .as_ref()
            .and_then(|d| d.plays.as_ref())
            .map(|p| p.all_plays.as_slice())
            .unwrap_or_default();
        let flat = self
            .plays
            .as_ref()
            .map(|p| p.all_plays.as_slice())
            .unwrap_or_default();
        nested.iter().chain(flat.iter())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GameData {
    #[serde(default)]
    pub status: UpstreamStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveData {
    #[serde(default)]
    pub plays: Option<Plays>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plays {
    #[serde(default)]
    pub all_plays: Vec<Play>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    #[serde(default)]
    pub matchup: Option<PlayMatchup>,
    #[serde(default)]
    pub play_events: Vec<PlayEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayMatchup {
    #[serde(default)]
    pub batter: Option<PersonRef>,
    #[serde(default)]
    pub pitcher: Option<PersonRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayEvent {
    #[serde(default)]
    pub player: Option<PersonRef>,
}

// =============================================================================
// Box score (`/game/{pk}/boxscore`)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Boxscore {
    #[serde(default)]
    pub teams: BoxscoreTeams,
}

impl Boxscore {
    /// Home first, then away.
    pub fn sides(&self) -> [&BoxscoreTeam; 2] {
        [&self.teams.home, &self.teams.away]
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BoxscoreTeams {
    #[serde(default)]
    pub home: BoxscoreTeam,
    #[serde(default)]
    pub away: BoxscoreTeam,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoxscoreTeam {
    /// Keyed by `ID<personId>`.
    #[serde(default)]
    pub players: HashMap<String, BoxscorePlayer>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default)]
    pub bench: Vec<BenchEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxscorePlayer {
    #[serde(default)]
    pub person: Option<PersonRef>,
    #[serde(default)]
    pub game_status: Option<PlayerGameStatus>,
    #[serde(default)]
    pub stats: Option<PlayerStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGameStatus {
    #[serde(default)]
    pub is_current_batter: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub batting: Option<BattingLine>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattingLine {
    #[serde(default)]
    pub at_bats: u32,
    #[serde(default)]
    pub hits: u32,
    #[serde(default)]
    pub base_on_balls: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    #[serde(default)]
    pub incoming_player: Option<PersonRef>,
}

/// The real API lists bench players as bare ids; richer payloads carry objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BenchEntry {
    Id(UpstreamId),
    Player(BenchPlayer),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchPlayer {
    #[serde(default)]
    pub id: Option<UpstreamId>,
    #[serde(default)]
    pub person: Option<PersonRef>,
    #[serde(default)]
    pub batting_order: Option<serde_json::Value>,
    #[serde(default)]
    pub stats: Option<serde_json::Value>,
}

impl BenchPlayer {
    pub fn is(&self, player_id: &str) -> bool {
        self.id.as_ref().is_some_and(|id| id.matches(player_id))
            || self.person.as_ref().is_some_and(|p| p.is(player_id))
    }
}

// =============================================================================
// Tests
// =============================================================================
