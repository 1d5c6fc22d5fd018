//! Per-day entry audit log.
//!
//! Each watch day gets `entry-log-YYYY-MM-DD.json`, a pretty-printed JSON
//! array. Writes go through a background task fed by a channel; closing the
//! handle drains whatever is still queued.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::data::models::NotificationEvent;
use crate::data::upstream::UpstreamId;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Audit log encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// The upstream `gamePk`, written as a JSON number when numeric.
    pub game_id: UpstreamId,
    pub player_name: String,
    pub player_id: String,
}

impl From<&NotificationEvent> for AuditEntry {
    fn from(event: &NotificationEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            game_id: UpstreamId::from(&event.game_id),
            player_name: event.player_name.clone(),
            player_id: event.player_id.clone(),
        }
    }
}

pub fn log_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("entry-log-{}.json", day.format("%Y-%m-%d")))
}

/// Append one entry to the array stored at `path`.
///
/// A missing file starts a new array. A file that does not hold a JSON array
/// of entries is replaced.
pub fn append_entry(path: &Path, entry: &AuditEntry) -> Result<usize, AuditError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut entries: Vec<AuditEntry> = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Corrupt audit log, starting a new one");
            Vec::new()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    entries.push(entry.clone());
    fs::write(path, serde_json::to_string_pretty(&entries)?)?;
    Ok(entries.len())
}

pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

struct AuditRecord {
    day: NaiveDate,
    entry: AuditEntry,
}

/// Sending side of the audit writer.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditHandle {
    /// Queue an entry for `day`'s file. Never blocks.
    pub fn record(&self, day: NaiveDate, entry: AuditEntry) {
        if self.tx.send(AuditRecord { day, entry }).is_err() {
            error!("Audit writer stopped, entry dropped");
        }
    }
}

pub struct AuditLog {
    handle: AuditHandle,
    writer: JoinHandle<()>,
}

impl AuditLog {
    /// Spawn the writer task for files under `dir`.
    pub fn spawn(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditRecord>();
        info!(dir = %dir.display(), "Audit log writer started");

        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let path = log_path(&dir, record.day);
                let game_id = record.entry.game_id.to_string();
                let write_path = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || append_entry(&write_path, &record.entry))
                        .await;
                match result {
                    Ok(Ok(count)) => {
                        debug!(path = %path.display(), %game_id, entries = count, "Audit entry written")
                    }
                    Ok(Err(e)) => error!(path = %path.display(), error = %e, "Failed to write audit entry"),
                    Err(e) => error!(error = %e, "Audit write task failed"),
                }
            }
            debug!("Audit log writer drained");
        });

        Self {
            handle: AuditHandle { tx },
            writer,
        }
    }

    pub fn handle(&self) -> AuditHandle {
        self.handle.clone()
    }

    /// Drop this sender and wait for queued writes. Entries queued through
    /// other live handles are flushed once those handles are dropped too.
    pub async fn close(self) {
        let Self { handle, writer } = self;
        drop(handle);
        if let Err(e) = writer.await {
            error!(error = %e, "Audit writer panicked");
        }
    }
}
