//! Upstream stats API access.
//!
//! Consumers depend on the `StatsApi` trait so the monitoring loop and the
//! entry detector can run against canned payloads.

pub mod client;
pub mod errors;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::models::GameId;
use crate::data::upstream::{Boxscore, LiveFeed, ScheduleResponse, UpstreamStatus};

use errors::ApiError;

#[async_trait]
pub trait StatsApi: Send + Sync {
    /// Schedule for one sport id (league level) on one date.
    async fn schedule(&self, sport_id: &str, date: NaiveDate) -> Result<ScheduleResponse, ApiError>;

    /// Current status of a game, fetched through its stored link.
    async fn game_status(&self, game_id: &GameId, link: &str) -> Result<UpstreamStatus, ApiError>;

    async fn boxscore(&self, game_id: &GameId, link: &str) -> Result<Boxscore, ApiError>;

    async fn live_feed(&self, game_id: &GameId, link: &str) -> Result<LiveFeed, ApiError>;
}
