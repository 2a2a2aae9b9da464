//! Error types for wire encoding.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// CBOR encoding failed.
    #[error("cbor encode error: {0}")]
    CborEncode(String),

    /// CBOR decoding failed.
    #[error("cbor decode error: {0}")]
    CborDecode(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
