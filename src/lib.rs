pub mod app;

pub mod event;

pub mod ui;

pub mod tui;

pub mod handler;

pub mod config;

pub mod notification;

pub mod cli;

pub mod store;

pub mod radio;

pub mod manager;

pub mod panel;

use thiserror::Error;

use crate::radio::Operation;

/// Error kinds shared by the radio layer and the network state manager.
///
/// Every variant is recovered locally: operations report through the
/// notification sink and the UI loop keeps running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("`{command}` failed: {message}")]
    Tool { command: String, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: Operation, seconds: u64 },

    #[error("no saved record for {0}")]
    NotFound(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is the bounded-timeout kind, as opposed to a
    /// tool failure or a bad record.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
