use std::io;
use thiserror::Error;

/// Errors raised by the munge store and the persisted platform state
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read platform state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plugin {0} is already queued for {1}")]
    AlreadyQueued(String, &'static str),

    #[error("Plugin {0} is already installed")]
    AlreadyInstalled(String),

    #[error("Plugin {0} is not installed")]
    NotInstalled(String),

    #[error("Invalid prepare queue: {0}")]
    InvalidQueue(String),
}
