//! Game status updater.
//!
//! Re-fetches each known game's status through its stored link. Games are
//! refreshed concurrently and independently: one failing request only leaves
//! that game's previous status in place.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::StatsApi;
use crate::data::models::{GameRecord, GameStatus, StatusChange};

/// Refresh every non-terminal game in place and return the observed changes.
pub async fn refresh_statuses(api: &dyn StatsApi, games: &mut [GameRecord]) -> Vec<StatusChange> {
    let refreshes = games
        .iter_mut()
        .filter(|g| !g.is_terminal())
        .map(|game| refresh_one(api, game));

    join_all(refreshes).await.into_iter().flatten().collect()
}

async fn refresh_one(api: &dyn StatsApi, game: &mut GameRecord) -> Option<StatusChange> {
    let upstream = match api.game_status(&game.id, &game.link).await {
        Ok(status) => status,
        Err(e) => {
            warn!(game_id = %game.id, error = %e, "Failed to refresh game status");
            return None;
        }
    };

    let status = GameStatus::from_upstream(&upstream.abstract_game_state, &upstream.detailed_state);
    let detailed = if upstream.detailed_state.is_empty() {
        upstream.abstract_game_state
    } else {
        upstream.detailed_state
    };

    debug!(game_id = %game.id, status = %status, detailed = %detailed, "Game status");
    let change = game.apply_status(status, detailed);

    if status.is_live() && !game.was_live {
        game.was_live = true;
        info!(
            game_id = %game.id,
            matchup = %game.matchup(),
            "Game is now live, checking for player entry"
        );
    }
    if let Some(c) = change.as_ref().filter(|c| c.became_terminal()) {
        info!(game_id = %c.game_id, status = %c.to, "Game finished");
    }

    change
}

// =============================================================================
// Tests
// =============================================================================
