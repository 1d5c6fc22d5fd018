//! Participation evidence strategies.
//!
//! Each strategy is a pure check of one upstream payload for one player id.
//! `boxscore_evidence` composes the box-score strategies in priority order;
//! the play-by-play check is the fallback when the box score has nothing.

use serde_json::Value;
use std::fmt;

use crate::data::upstream::{BenchEntry, Boxscore, BoxscorePlayer, LiveFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// Listed player who is batting or has a batting line.
    ActiveLineup,
    /// Named as the incoming player of a substitution.
    Substitution,
    /// Bench player with a batting-order slot or a stat line.
    Bench,
    /// Batter, pitcher or event participant in the live feed.
    PlayByPlay,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ActiveLineup => "active lineup",
            Self::Substitution => "substitution",
            Self::Bench => "bench",
            Self::PlayByPlay => "play-by-play",
        };
        f.write_str(s)
    }
}

type BoxscoreStrategy = fn(&Boxscore, &str) -> bool;

const BOXSCORE_STRATEGIES: [(Evidence, BoxscoreStrategy); 3] = [
    (Evidence::ActiveLineup, active_lineup),
    (Evidence::Substitution, substitution),
    (Evidence::Bench, bench),
];

/// First box-score strategy that finds the player, if any.
pub fn boxscore_evidence(boxscore: &Boxscore, player_id: &str) -> Option<Evidence> {
    BOXSCORE_STRATEGIES
        .iter()
        .find(|(_, strategy)| strategy(boxscore, player_id))
        .map(|(evidence, _)| *evidence)
}

pub fn active_lineup(boxscore: &Boxscore, player_id: &str) -> bool {
    let key = format!("ID{}", player_id.trim());
    boxscore.sides().iter().any(|team| {
        team.players.iter().any(|(k, p)| {
            let is_player = match p.person.as_ref() {
                Some(person) if person.id.is_some() => person.is(player_id),
                _ => k == &key,
            };
            is_player && shows_participation(p)
        })
    })
}

pub fn substitution(boxscore: &Boxscore, player_id: &str) -> bool {
    boxscore.sides().iter().any(|team| {
        team.substitutions.iter().any(|s| {
            s.incoming_player
                .as_ref()
                .is_some_and(|p| p.is(player_id))
        })
    })
}

pub fn bench(boxscore: &Boxscore, player_id: &str) -> bool {
    boxscore.sides().iter().any(|team| {
        team.bench.iter().any(|entry| match entry {
            // A bare id says nothing about participation.
            BenchEntry::Id(_) => false,
            BenchEntry::Player(p) => {
                p.is(player_id) && (is_recorded(&p.batting_order) || is_recorded(&p.stats))
            }
        })
    })
}

pub fn play_by_play(feed: &LiveFeed, player_id: &str) -> bool {
    feed.all_plays().any(|play| {
        let in_matchup = play.matchup.as_ref().is_some_and(|m| {
            m.batter.as_ref().is_some_and(|p| p.is(player_id))
                || m.pitcher.as_ref().is_some_and(|p| p.is(player_id))
        });
        in_matchup
            || play
                .play_events
                .iter()
                .any(|e| e.player.as_ref().is_some_and(|p| p.is(player_id)))
    })
}

fn shows_participation(player: &BoxscorePlayer) -> bool {
    let current_batter = player
        .game_status
        .as_ref()
        .is_some_and(|s| s.is_current_batter);
    let has_batting_line = player
        .stats
        .as_ref()
        .and_then(|s| s.batting.as_ref())
        .is_some_and(|b| b.at_bats > 0 || b.hits > 0 || b.base_on_balls > 0);
    current_batter || has_batting_line
}

fn is_recorded(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

// =============================================================================
// Tests
// =============================================================================
