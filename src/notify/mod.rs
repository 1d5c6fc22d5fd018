//! Notification channels for "player entered" events.

pub mod carriers;
pub mod mail;
pub mod notifier;
pub mod sms;
pub mod webhook;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by {endpoint}: HTTP {status_code}")]
    Rejected { endpoint: String, status_code: u16 },

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
