//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use chrono::NaiveTime;
use chrono_tz::Tz;
use std::time::Duration;

use crate::api::client::DEFAULT_BASE_URL;
use crate::notify::carriers::DEFAULT_SMS_DOMAIN;
use crate::notify::mail::{service_endpoint, SmtpEndpoint, SMTPS_PORT};
use crate::notify::sms::SmsRecipient;

pub const DEFAULT_LEAGUE_LEVEL: &str = "14";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_DAILY_CHECK_TIME: &str = "09:00";
pub const DEFAULT_EMAIL_SERVICE: &str = "gmail";

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // Watch target
    pub player_id: String,
    pub player_name: String,
    pub team_id: String,
    pub league_level: String,

    // Stats API
    pub stats_api_base: String,
    pub api_rate_limit: u32,
    pub http_timeout_secs: u64,

    // Polling
    pub check_interval_ms: u64,
    pub stop_after_entry: bool,
    pub scheduled_games_only: bool,
    pub pre_game_lead_minutes: i64,
    pub daily_check_time: String,
    pub timezone: String,

    // SMS over email
    pub sms_recipients_raw: String,
    pub email_service: String,
    pub smtp_host: String,
    /// 0 means the service default, or 465 for a custom host.
    pub smtp_port: u16,
    pub email_user: String,
    pub email_pass: String,
    pub email_from: String,
    pub default_sms_domain: String,

    // Webhook
    pub webhook_url: String,

    // Audit
    pub audit_log_dir: String,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_id: String::new(),
            player_name: "Player Name".to_string(),
            team_id: String::new(),
            league_level: DEFAULT_LEAGUE_LEVEL.to_string(),
            stats_api_base: DEFAULT_BASE_URL.to_string(),
            api_rate_limit: 5,
            http_timeout_secs: 10,
            check_interval_ms: 60_000,
            stop_after_entry: true,
            scheduled_games_only: true,
            pre_game_lead_minutes: 0,
            daily_check_time: DEFAULT_DAILY_CHECK_TIME.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            sms_recipients_raw: "[]".to_string(),
            email_service: DEFAULT_EMAIL_SERVICE.to_string(),
            smtp_host: String::new(),
            smtp_port: 0,
            email_user: String::new(),
            email_pass: String::new(),
            email_from: "MiLB Watcher".to_string(),
            default_sms_domain: DEFAULT_SMS_DOMAIN.to_string(),
            webhook_url: String::new(),
            audit_log_dir: "./logs".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();
        let d = Self::default();

        Self {
            player_id: env_str("PLAYER_ID", &d.player_id).trim().to_string(),
            player_name: env_str("PLAYER_NAME", &d.player_name),
            team_id: env_str("TEAM_ID", &d.team_id).trim().to_string(),
            league_level: env_str("LEAGUE_LEVEL", &d.league_level).trim().to_string(),

            stats_api_base: env_str("STATS_API_BASE", &d.stats_api_base),
            api_rate_limit: env_u32("API_RATE_LIMIT", d.api_rate_limit),
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", d.http_timeout_secs),

            check_interval_ms: env_u64("CHECK_INTERVAL", d.check_interval_ms),
            stop_after_entry: env_flag_unless_false("STOP_AFTER_ENTRY"),
            scheduled_games_only: env_flag_unless_false("CHECK_FOR_SCHEDULED_GAMES_ONLY"),
            pre_game_lead_minutes: env_i64("PRE_GAME_LEAD_MINUTES", d.pre_game_lead_minutes),
            daily_check_time: env_str("DAILY_CHECK_TIME", &d.daily_check_time),
            timezone: env_str("TIMEZONE", &d.timezone),

            sms_recipients_raw: env_str("SMS_RECIPIENTS", &d.sms_recipients_raw),
            email_service: env_str("EMAIL_SERVICE", &d.email_service),
            smtp_host: env_str("SMTP_HOST", &d.smtp_host).trim().to_string(),
            smtp_port: env_u16("SMTP_PORT", d.smtp_port),
            email_user: env_str("EMAIL_USER", &d.email_user),
            email_pass: env_str("EMAIL_PASS", &d.email_pass),
            email_from: env_str("EMAIL_FROM", &d.email_from),
            default_sms_domain: env_str("DEFAULT_SMS_DOMAIN", &d.default_sms_domain),

            webhook_url: env_str("WEBHOOK_URL", &d.webhook_url),

            audit_log_dir: env_str("AUDIT_LOG_DIR", &d.audit_log_dir),

            log_level: env_str("LOG_LEVEL", &d.log_level),
            log_json: env_bool("LOG_JSON", d.log_json),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn pre_game_lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pre_game_lead_minutes.max(0))
    }

    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| format!("TIMEZONE '{}' is not a known IANA zone", self.timezone))
    }

    pub fn check_time(&self) -> Result<NaiveTime, String> {
        parse_daily_time(&self.daily_check_time)
    }

    /// Recipients from the SMS_RECIPIENTS JSON array. Malformed input yields
    /// no recipients; `warnings()` reports it.
    pub fn sms_recipients(&self) -> Vec<SmsRecipient> {
        parse_recipients(&self.sms_recipients_raw).unwrap_or_default()
    }

    /// SMTP server: SMTP_HOST when set, otherwise the EMAIL_SERVICE entry.
    /// SMTP_PORT overrides either port.
    pub fn smtp_endpoint(&self) -> Option<SmtpEndpoint> {
        let mut endpoint = if self.smtp_host.is_empty() {
            service_endpoint(&self.email_service)?
        } else {
            SmtpEndpoint {
                host: self.smtp_host.clone(),
                port: SMTPS_PORT,
            }
        };
        if self.smtp_port != 0 {
            endpoint.port = self.smtp_port;
        }
        Some(endpoint)
    }

    fn email_credentials_set(&self) -> bool {
        !self.email_user.trim().is_empty() && !self.email_pass.is_empty()
    }

    pub fn email_configured(&self) -> bool {
        self.email_credentials_set() && self.smtp_endpoint().is_some()
    }

    /// From header. A bare display name is paired with EMAIL_USER.
    pub fn email_sender(&self) -> String {
        let from = self.email_from.trim();
        if from.contains('@') {
            from.to_string()
        } else if from.is_empty() {
            self.email_user.trim().to_string()
        } else {
            format!("{from} <{}>", self.email_user.trim())
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.player_id.is_empty() {
            errors.push("PLAYER_ID is required".to_string());
        }
        if self.team_id.is_empty() {
            errors.push("TEAM_ID is required".to_string());
        }
        if let Err(e) = self.tz() {
            errors.push(e);
        }
        if let Err(e) = self.check_time() {
            errors.push(e);
        }
        if self.check_interval_ms == 0 {
            errors.push("CHECK_INTERVAL must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Problems that degrade notifications but do not stop the watcher.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let recipients = match parse_recipients(&self.sms_recipients_raw) {
            Ok(r) => r,
            Err(e) => {
                warnings.push(format!("SMS_RECIPIENTS is not valid JSON: {e}"));
                Vec::new()
            }
        };

        if recipients.is_empty() {
            warnings.push("No SMS recipients configured".to_string());
        } else if !self.email_credentials_set() {
            warnings.push("EMAIL_USER or EMAIL_PASS missing, SMS disabled".to_string());
        } else if self.smtp_endpoint().is_none() {
            warnings.push(format!(
                "EMAIL_SERVICE '{}' is not a known service and SMTP_HOST is not set, SMS disabled",
                self.email_service
            ));
        }

        let sms_enabled = !recipients.is_empty() && self.email_configured();
        if !sms_enabled && self.webhook_url.trim().is_empty() {
            warnings.push("No notification channel configured, alerts will only be logged".to_string());
        }

        warnings
    }
}

/// Parse `[{"phoneNumber": "...", "carrier": "..."}]`. Blank input is an empty list.
pub fn parse_recipients(raw: &str) -> Result<Vec<SmsRecipient>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

/// Parse `HH:MM` (or `HH:MM:SS`) local wall-clock time.
pub fn parse_daily_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("DAILY_CHECK_TIME '{raw}' must be HH:MM"))
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// Anything but an explicit `false` counts as enabled.
fn env_flag_unless_false(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
