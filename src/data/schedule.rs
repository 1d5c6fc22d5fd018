//! Schedule fetcher.
//!
//! Pulls the day's schedule for a league level and keeps the followed team's
//! games that have not finished yet, ordered by first pitch.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, instrument, warn};

use crate::api::StatsApi;
use crate::data::models::{GameId, GameRecord, GameStatus};
use crate::data::upstream::{ScheduleGame, ScheduleResponse};

/// Fetch today's games for `team_id`. Any failure yields an empty list.
#[instrument(level = "info", skip(api))]
pub async fn fetch_games_for_team(
    api: &dyn StatsApi,
    sport_id: &str,
    date: NaiveDate,
    team_id: &str,
) -> Vec<GameRecord> {
    let response = match api.schedule(sport_id, date).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, sport_id, %date, "Failed to fetch schedule");
            return Vec::new();
        }
    };

    let games = games_for_team(response, team_id);
    for game in &games {
        info!(
            game_id = %game.id,
            matchup = %game.matchup(),
            status = %game.detailed_state,
            start = %game.start_time,
            "Scheduled game"
        );
    }
    games
}

/// Translate a schedule payload into records for the followed team.
///
/// Only Preview and Live games are kept; entries without a parseable
/// `gameDate` are dropped.
pub fn games_for_team(response: ScheduleResponse, team_id: &str) -> Vec<GameRecord> {
    let mut games: Vec<GameRecord> = response
        .dates
        .into_iter()
        .flat_map(|d| d.games)
        .filter(|g| g.teams.home.team.id.matches(team_id) || g.teams.away.team.id.matches(team_id))
        .filter_map(to_record)
        .filter(|g| matches!(g.status, GameStatus::Preview | GameStatus::Live))
        .collect();

    games.sort_by_key(|g| g.start_time);
    games
}

fn to_record(game: ScheduleGame) -> Option<GameRecord> {
    let id = GameId::from(&game.game_pk);
    let start_time = match game.game_date.as_deref().map(DateTime::parse_from_rfc3339) {
        Some(Ok(dt)) => dt.with_timezone(&Utc),
        Some(Err(e)) => {
            warn!(game_id = %id, error = %e, "Unparseable gameDate, skipping game");
            return None;
        }
        None => {
            warn!(game_id = %id, "Missing gameDate, skipping game");
            return None;
        }
    };

    let status = GameStatus::from_upstream(
        &game.status.abstract_game_state,
        &game.status.detailed_state,
    );
    let detailed_state = if game.status.detailed_state.is_empty() {
        game.status.abstract_game_state.clone()
    } else {
        game.status.detailed_state
    };

    Some(GameRecord {
        id,
        status,
        detailed_state,
        link: game.link,
        start_time,
        home_team: game.teams.home.team.name,
        away_team: game.teams.away.team.name,
        was_live: status.is_live(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeStatsApi;
    use chrono::TimeZone;

    const SCENARIO: &str = r#"{"dates":[{"games":[{"gamePk":123,
        "status":{"abstractGameState":"Preview"},
        "teams":{"home":{"team":{"id":"436","name":"A"}},"away":{"team":{"id":"9","name":"B"}}},
        "gameDate":"2024-05-01T23:05:00Z","link":"/game/123"}]}]}"#;

    fn game_json(pk: u64, home: u64, away: u64, state: &str, date: &str) -> String {
        format!(
            r#"{{"gamePk":{pk},"link":"/api/v1.1/game/{pk}/feed/live","gameDate":"{date}",
            "status":{{"abstractGameState":"{state}","detailedState":"{state}"}},
            "teams":{{"home":{{"team":{{"id":{home},"name":"Home {home}"}}}},
                      "away":{{"team":{{"id":{away},"name":"Away {away}"}}}}}}}}"#
        )
    }

    fn schedule(games: &[String]) -> ScheduleResponse {
        let json = format!(r#"{{"dates":[{{"games":[{}]}}]}}"#, games.join(","));
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_scenario_yields_one_preview_game() {
        let resp: ScheduleResponse = serde_json::from_str(SCENARIO).unwrap();
        let games = games_for_team(resp, "436");
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.id, GameId::new("123"));
        assert_eq!(game.status, GameStatus::Preview);
        assert_eq!(game.start_time, Utc.with_ymd_and_hms(2024, 5, 1, 23, 5, 0).unwrap());
        assert_eq!(game.matchup(), "B @ A");
        assert_eq!(game.link, "/game/123");
    }

    #[test]
    fn test_filters_other_teams_and_finished_games() {
        let resp = schedule(&[
            game_json(1, 436, 9, "Final", "2024-05-01T17:05:00Z"),
            game_json(2, 100, 200, "Preview", "2024-05-01T18:05:00Z"),
            game_json(3, 9, 436, "Live", "2024-05-01T19:05:00Z"),
        ]);
        let games = games_for_team(resp, "436");
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, GameId::new("3"));
        assert!(games[0].was_live);
    }

    #[test]
    fn test_orders_doubleheader_by_start_time() {
        let resp = schedule(&[
            game_json(20, 436, 9, "Preview", "2024-05-01T23:05:00Z"),
            game_json(10, 436, 9, "Preview", "2024-05-01T16:05:00Z"),
        ]);
        let ids: Vec<String> = games_for_team(resp, "436")
            .into_iter()
            .map(|g| g.id.to_string())
            .collect();
        assert_eq!(ids, vec!["10", "20"]);
    }

    #[test]
    fn test_skips_unparseable_dates() {
        let resp = schedule(&[game_json(5, 436, 9, "Preview", "tomorrow-ish")]);
        assert!(games_for_team(resp, "436").is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_empty() {
        let api = FakeStatsApi::new();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let games = fetch_games_for_team(&api, "14", date, "436").await;
        assert!(games.is_empty());
        assert_eq!(api.calls(), vec!["schedule:14".to_string()]);
    }
}
