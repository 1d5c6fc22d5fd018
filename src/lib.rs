//! Library entrypoint for milb-entry-watcher.
//!
//! Exposes all modules so integration tests can import them.

pub mod api;
pub mod config;
pub mod data;
pub mod detection;
pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod state;
