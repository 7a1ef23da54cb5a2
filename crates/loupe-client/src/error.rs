//! Error types for the polling client.

use thiserror::Error;

/// Errors that can occur while polling the log stream.
#[derive(Debug, Error)]
pub enum PollError {
    /// The request failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The deployment rejected the credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The request was cancelled cooperatively. Expected during teardown
    /// and gate changes; never counts toward failure backoff.
    #[error("cancelled")]
    Cancelled,
}

impl PollError {
    /// Whether this error is a cooperative cancellation rather than a
    /// real failure.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for PollError {
    fn from(e: reqwest::Error) -> Self {
        if e.status()
            .is_some_and(|s| s == reqwest::StatusCode::UNAUTHORIZED || s == reqwest::StatusCode::FORBIDDEN)
        {
            Self::Unauthorized
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, PollError>;
