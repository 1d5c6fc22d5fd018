//! MiLB player-entry watcher.
//!
//! Polls the MLB stats API for a team's games and sends an alert when the
//! watched player enters a live game.
//!
//! Architecture:
//! - Tokio async runtime, one scheduler task owning all per-day state
//! - Rate-limited REST client for statsapi.mlb.com
//! - Box score / play-by-play entry detection
//! - Email-to-SMS and webhook notification channels
//! - Per-day JSON audit log written by a background task

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use milb_entry_watcher::api::client::StatsClient;
use milb_entry_watcher::api::StatsApi;
use milb_entry_watcher::config::Settings;
use milb_entry_watcher::data::models::PlayerIdentity;
use milb_entry_watcher::detection::entry_detector::EntryDetector;
use milb_entry_watcher::monitor::audit_log::AuditLog;
use milb_entry_watcher::monitor::monitoring_loop::{LoopConfig, MonitoringLoop};
use milb_entry_watcher::notify::mail::SmtpMailer;
use milb_entry_watcher::notify::notifier::Notifier;
use milb_entry_watcher::notify::sms::SmsGateway;
use milb_entry_watcher::notify::webhook::WebhookChannel;
use milb_entry_watcher::scheduler::daily::{local_date, DailyScheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== MiLB Entry Watcher ===");
    info!(
        player_id = %settings.player_id,
        player_name = %settings.player_name,
        team_id = %settings.team_id,
        league_level = %settings.league_level,
        check_interval_ms = settings.check_interval_ms,
        timezone = %settings.timezone,
        "Configuration loaded"
    );

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }
    for w in settings.warnings() {
        warn!(warning = %w, "Configuration warning");
    }
    let tz = settings.tz().map_err(anyhow::Error::msg)?;
    let check_time = settings.check_time().map_err(anyhow::Error::msg)?;

    // Stats API client.
    let client = StatsClient::new(
        &settings.stats_api_base,
        settings.api_rate_limit,
        settings.http_timeout_secs,
    )?;
    let api: Arc<dyn StatsApi> = Arc::new(client);

    let notifier = build_notifier(&settings).await;
    if notifier.is_empty() {
        warn!("No notification channels active, alerts will only be logged");
    }

    // Audit log writer.
    let audit = AuditLog::spawn(&settings.audit_log_dir);

    let player = PlayerIdentity {
        id: settings.player_id.clone(),
        name: settings.player_name.clone(),
    };
    let loop_config = LoopConfig {
        sport_id: settings.league_level.clone(),
        team_id: settings.team_id.clone(),
        stop_after_entry: settings.stop_after_entry,
        scheduled_games_only: settings.scheduled_games_only,
        pre_game_lead: settings.pre_game_lead(),
    };
    let mut monitor = MonitoringLoop::new(
        api,
        EntryDetector::new(player),
        notifier,
        loop_config,
        local_date(Utc::now(), tz),
    )
    .with_audit(audit.handle());

    monitor.on_status_change(|change| {
        if change.became_live() {
            info!(game_id = %change.game_id, "Game started");
        }
    });

    // Shutdown signal.
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let mut scheduler = DailyScheduler::new(SchedulerConfig {
        timezone: tz,
        check_time,
        poll_interval: settings.poll_interval(),
        check_at_startup: true,
    });
    scheduler.run(&mut monitor, shutdown).await;

    // Graceful shutdown: drop the monitor's audit handle so the writer can drain.
    info!("Shutting down...");
    drop(monitor);
    audit.close().await;
    info!("Watcher shutdown complete.");

    Ok(())
}

async fn build_notifier(settings: &Settings) -> Notifier {
    let mut notifier = Notifier::new();

    let recipients = settings.sms_recipients();
    let endpoint = settings
        .smtp_endpoint()
        .filter(|_| settings.email_configured() && !recipients.is_empty());
    if let Some(endpoint) = endpoint {
        match SmtpMailer::new(
            &endpoint,
            settings.email_user.trim(),
            &settings.email_pass,
            settings.http_timeout_secs,
        ) {
            Ok(mailer) => {
                // Not fatal: every alert still attempts delivery.
                if let Err(e) = mailer.verify().await {
                    warn!(
                        host = %endpoint.host,
                        port = endpoint.port,
                        error = %e,
                        "Configuration warning: SMTP connection check failed"
                    );
                }
                info!(recipients = recipients.len(), host = %endpoint.host, "SMS gateway enabled");
                notifier.add_channel(Box::new(SmsGateway::new(
                    Arc::new(mailer),
                    &settings.email_sender(),
                    recipients,
                    &settings.default_sms_domain,
                )));
            }
            Err(e) => warn!(error = %e, "SMS gateway disabled"),
        }
    }

    if !settings.webhook_url.trim().is_empty() {
        match WebhookChannel::new(&settings.webhook_url, settings.http_timeout_secs) {
            Ok(hook) => notifier.add_channel(Box::new(hook)),
            Err(e) => warn!(error = %e, "Webhook disabled"),
        }
    }

    notifier
}

async fn wait_for_shutdown(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
    token.cancel();
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
