//! Error types for the ping responder.

use commsync_protocol::{CodecError, ErrorResponse};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while answering a ping.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request failed validation. Nothing was written.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The operation requires an authenticated viewer.
    #[error("not logged in")]
    NotLoggedIn,

    /// A collaborator fetch or write failed.
    #[error("database error: {0}")]
    Database(String),

    /// Wire encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the code sent to clients in `{"error": code}`.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::InvalidParameters(_) => "invalid_parameters",
            ServerError::NotLoggedIn => "not_logged_in",
            ServerError::Database(_) => "database_error",
            ServerError::Codec(_) | ServerError::Internal(_) => "internal_error",
        }
    }

    /// Returns true if the client caused this error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidParameters(_) | ServerError::NotLoggedIn
        )
    }

    /// Returns true if this is a server-side failure.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Converts into the wire error body.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_code())
    }
}
