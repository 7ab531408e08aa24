//! Error types shared across the crate

use thiserror::Error;

/// Failure of the persistent key/value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store file does not hold a JSON object")]
    NotAnObject,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A command message that could not be turned into a [`crate::protocol::Command`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown message type")]
    UnknownType,

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Failure talking to the timer authority from a view
#[derive(Error, Debug)]
pub enum LinkError {
    /// The authority process is not running or the channel is closed
    #[error("timer authority unreachable: {0}")]
    Unreachable(String),

    /// The authority answered with `success: false`
    #[error("timer authority rejected the command: {0}")]
    Rejected(String),

    #[error("unexpected reply from timer authority: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LinkError::Decode(err.to_string())
        } else {
            LinkError::Unreachable(err.to_string())
        }
    }
}
