//! In-memory `StatsApi` serving canned JSON for unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::data::models::GameId;
use crate::data::upstream::{Boxscore, LiveFeed, ScheduleResponse, UpstreamStatus};

use super::errors::ApiError;
use super::StatsApi;

#[derive(Default)]
pub(crate) struct FakeStatsApi {
    schedule: Mutex<Option<String>>,
    statuses: Mutex<HashMap<String, (String, String)>>,
    boxscores: Mutex<HashMap<String, String>>,
    live_feeds: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeStatsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_schedule(&self, json: &str) {
        *self.schedule.lock().unwrap() = Some(json.to_string());
    }

    pub fn set_status(&self, game_id: &str, abstract_state: &str, detailed: &str) {
        self.statuses.lock().unwrap().insert(
            game_id.to_string(),
            (abstract_state.to_string(), detailed.to_string()),
        );
    }

    pub fn set_boxscore(&self, game_id: &str, json: &str) {
        self.boxscores
            .lock()
            .unwrap()
            .insert(game_id.to_string(), json.to_string());
    }

    pub fn set_live_feed(&self, game_id: &str, json: &str) {
        self.live_feeds
            .lock()
            .unwrap()
            .insert(game_id.to_string(), json.to_string());
    }

    /// Recorded calls, formatted `"<endpoint>:<game id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, game_id: &str) -> usize {
        let suffix = format!(":{game_id}");
        self.calls().iter().filter(|c| c.ends_with(&suffix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn parse<T: DeserializeOwned>(json: Option<String>) -> Result<T, ApiError> {
    let json = json.ok_or_else(|| ApiError::from_response(404, "not found"))?;
    serde_json::from_str(&json).map_err(|e| ApiError::Deserialization(e.to_string()))
}

#[async_trait]
impl StatsApi for FakeStatsApi {
    async fn schedule(&self, sport_id: &str, _date: NaiveDate) -> Result<ScheduleResponse, ApiError> {
        self.record(format!("schedule:{sport_id}"));
        parse(self.schedule.lock().unwrap().clone())
    }

    async fn game_status(&self, game_id: &GameId, _link: &str) -> Result<UpstreamStatus, ApiError> {
        self.record(format!("status:{game_id}"));
        let (abstract_game_state, detailed_state) = self
            .statuses
            .lock()
            .unwrap()
            .get(game_id.as_str())
            .cloned()
            .ok_or_else(|| ApiError::Network("connection reset".into()))?;
        Ok(UpstreamStatus {
            abstract_game_state,
            detailed_state,
        })
    }

    async fn boxscore(&self, game_id: &GameId, _link: &str) -> Result<Boxscore, ApiError> {
        self.record(format!("boxscore:{game_id}"));
        parse(self.boxscores.lock().unwrap().get(game_id.as_str()).cloned())
    }

    async fn live_feed(&self, game_id: &GameId, _link: &str) -> Result<LiveFeed, ApiError> {
        self.record(format!("feed:{game_id}"));
        parse(self.live_feeds.lock().unwrap().get(game_id.as_str()).cloned())
    }
}
