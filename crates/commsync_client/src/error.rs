//! Error types for the sync client.

use commsync_protocol::CodecError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the sync client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with an error body.
    #[error("server error: {0}")]
    Server(String),

    /// Wire encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The operation requires a logged-in viewer.
    #[error("not logged in")]
    NotLoggedIn,

    /// The driver task is no longer running.
    #[error("sync driver stopped")]
    DriverStopped,
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a server error code to an error.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not_logged_in" => Self::NotLoggedIn,
            other => Self::Server(other.to_string()),
        }
    }

    /// Returns true if the next scheduled ping may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server(code) => code != "invalid_parameters",
            _ => false,
        }
    }
}
