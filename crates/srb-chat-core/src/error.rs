//! Error types for srb-chat.
//!
//! Transport errors come from the HTTP layer, turn failures describe why a
//! streaming turn took the error path, and submit rejections describe why a
//! turn was never started.

use std::time::Duration;

use thiserror::Error;

/// A result type using `TransportError`.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while talking to the chat backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or a placeholder when it could not be read.
        message: String,
    },

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The configured backend URL is unusable.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

/// Why a streaming turn ended on the error path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnFailure {
    /// The request could not be sent or the body could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The backend sent an explicit `error` frame.
    #[error("backend error: {0}")]
    Backend(String),

    /// No bytes arrived within the configured idle timeout.
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),
}

impl From<TransportError> for TurnFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status, .. } => Self::Status(status),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Why a submission did not start a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    /// The text was empty after trimming.
    #[error("message is empty")]
    Empty,

    /// Another turn is still streaming.
    #[error("a reply is still streaming")]
    Busy,
}
