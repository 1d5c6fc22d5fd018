use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::data::models::NotificationEvent;

use super::notifier::{DeliveryReport, NotificationChannel};
use super::NotifyError;

/// Chat webhook client (Discord-compatible `{"content": ...}` payload).
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    hook_url: String,
}

impl WebhookChannel {
    pub fn new(hook_url: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        if hook_url.trim().is_empty() {
            return Err(NotifyError::NotConfigured("webhook url".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            hook_url: hook_url.trim().to_string(),
        })
    }

    pub fn payload(event: &NotificationEvent) -> serde_json::Value {
        serde_json::json!({ "content": format!(":baseball: {}", event.message_body()) })
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.hook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                endpoint: "webhook".into(),
                status_code: status.as_u16(),
            });
        }
        info!(status = status.as_u16(), "Posted message to webhook");
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &NotificationEvent) -> DeliveryReport {
        let result = self.post(&Self::payload(event)).await;
        DeliveryReport::from_results(self.name(), [("webhook".to_string(), result)])
    }
}
