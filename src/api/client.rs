//! Async REST client for the MLB stats API.
//!
//! Features:
//! - Rate limiting (configurable, default 5 req/sec)
//! - Typed responses
//! - No retries: a failed request is reported and the next tick tries again

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::data::models::GameId;
use crate::data::upstream::{Boxscore, GameData, LiveFeed, ScheduleResponse, UpstreamStatus};

use super::errors::ApiError;
use super::StatsApi;

pub const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com/api/v1";

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Envelope for reading only `gameData.status` from a live-feed document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusEnvelope {
    #[serde(default)]
    game_data: GameData,
}

/// Async REST client for `statsapi.mlb.com`.
pub struct StatsClient {
    base_url: String,
    client: Client,
    rate_limiter: Arc<DirectLimiter>,
}

impl StatsClient {
    pub fn new(base_url: &str, rate_limit: u32, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;

        let quota = Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter,
        })
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.rate_limiter.until_ready().await;

        debug!(url = %url, "API request");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        let text = response.text().await.map_err(ApiError::from_reqwest)?;
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Resolve a link as handed out by the schedule endpoint.
    ///
    /// Versioned links (`/api/v1.1/...`) are rooted at the host; anything else
    /// is relative to the configured base URL.
    fn resolve_link(&self, link: &str) -> Result<String, ApiError> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        if link.starts_with("/api/") {
            let base = Url::parse(&self.base_url)
                .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
            return base
                .join(link)
                .map(|u| u.to_string())
                .map_err(|e| ApiError::InvalidUrl(format!("{link}: {e}")));
        }
        if link.starts_with('/') {
            Ok(format!("{}{}", self.base_url, link))
        } else {
            Ok(format!("{}/{}", self.base_url, link))
        }
    }

    fn game_resource_url(&self, game_id: &GameId, link: &str, resource: &str) -> String {
        format!("{}{}/{}", self.base_url, game_root(game_id, link), resource)
    }
}

/// Base path for a game's sub-resources (`/game/{pk}`).
///
/// Relative links such as `/game/123/` or `/game/123/feed/live` are reused;
/// versioned or absolute links fall back to the id-based path.
pub fn game_root(game_id: &GameId, link: &str) -> String {
    let trimmed = link.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/feed/live").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.starts_with("/api/") || trimmed.contains("://") {
        format!("/game/{game_id}")
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[async_trait]
impl StatsApi for StatsClient {
    async fn schedule(&self, sport_id: &str, date: NaiveDate) -> Result<ScheduleResponse, ApiError> {
        let url = format!("{}/schedule/games/", self.base_url);
        let date = date.format("%Y-%m-%d").to_string();
        self.get_json(&url, &[("sportId", sport_id), ("date", &date)])
            .await
    }

    async fn game_status(&self, game_id: &GameId, link: &str) -> Result<UpstreamStatus, ApiError> {
        let url = if link.trim().is_empty() {
            self.game_resource_url(game_id, link, "feed/live")
        } else {
            self.resolve_link(link)?
        };
        let envelope: StatusEnvelope = self.get_json(&url, &[]).await?;
        Ok(envelope.game_data.status)
    }

    async fn boxscore(&self, game_id: &GameId, link: &str) -> Result<Boxscore, ApiError> {
        let url = self.game_resource_url(game_id, link, "boxscore");
        self.get_json(&url, &[]).await
    }

    async fn live_feed(&self, game_id: &GameId, link: &str) -> Result<LiveFeed, ApiError> {
        let url = self.game_resource_url(game_id, link, "feed/live");
        self.get_json(&url, &[]).await
    }
}

// =============================================================================
// Tests
// =============================================================================
