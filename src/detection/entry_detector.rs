//! Entry detector.
//!
//! Decides whether the watched player has newly entered a game. The box score
//! is consulted first; the live play-by-play feed is the fallback. A failure
//! fetching either source only disables that source for this call.

use tracing::{debug, info, instrument, warn};

use crate::api::StatsApi;
use crate::data::models::{GameId, PlayerIdentity};
use crate::state::watch_state::WatchState;

use super::evidence::{self, Evidence};

pub struct EntryDetector {
    player: PlayerIdentity,
}

impl EntryDetector {
    pub fn new(player: PlayerIdentity) -> Self {
        Self { player }
    }

    pub fn player(&self) -> &PlayerIdentity {
        &self.player
    }

    /// Returns true at most once per game: the first time participation
    /// evidence turns up while the player was not yet known to be in a game.
    ///
    /// Any evidence sets the day's "player in game" flag, whether or not it
    /// is a new entry.
    #[instrument(level = "debug", skip_all, fields(game_id = %game_id))]
    pub async fn check(
        &self,
        api: &dyn StatsApi,
        state: &mut WatchState,
        game_id: &GameId,
        link: &str,
    ) -> bool {
        if state.is_confirmed(game_id) {
            debug!("Game already confirmed, skipping");
            return false;
        }

        let Some(evidence) = self.find_evidence(api, game_id, link).await else {
            debug!(player = %self.player.name, "Player not found in game");
            return false;
        };

        let newly_entered = state.record_participation(game_id);
        if newly_entered {
            info!(
                player = %self.player.name,
                player_id = %self.player.id,
                %evidence,
                "Player has entered the game"
            );
        } else {
            debug!(%evidence, "Player already active in a game");
        }
        newly_entered
    }

    /// Search the box score, then the live feed, for participation evidence.
    pub async fn find_evidence(
        &self,
        api: &dyn StatsApi,
        game_id: &GameId,
        link: &str,
    ) -> Option<Evidence> {
        match api.boxscore(game_id, link).await {
            Ok(boxscore) => {
                if let Some(found) = evidence::boxscore_evidence(&boxscore, &self.player.id) {
                    return Some(found);
                }
            }
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Failed to fetch box score");
            }
        }

        match api.live_feed(game_id, link).await {
            Ok(feed) => evidence::play_by_play(&feed, &self.player.id).then_some(Evidence::PlayByPlay),
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Failed to fetch live feed");
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
