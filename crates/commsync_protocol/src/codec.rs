//! JSON and CBOR wire codecs.
//!
//! JSON is what the web and native clients speak. CBOR carries the same
//! serde model in a more compact form for the loopback transport and the
//! CLI's binary fixtures.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encoding used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// UTF-8 JSON.
    #[default]
    Json,
    /// CBOR (RFC 8949).
    Cbor,
}

impl WireFormat {
    /// Returns the MIME type for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Json => "application/json",
            WireFormat::Cbor => "application/cbor",
        }
    }
}

/// Encodes `value` in `format`.
pub fn encode<T: Serialize>(format: WireFormat, value: &T) -> CodecResult<Vec<u8>> {
    match format {
        WireFormat::Json => Ok(serde_json::to_vec(value)?),
        WireFormat::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)
                .map_err(|e| CodecError::CborEncode(e.to_string()))?;
            Ok(buf)
        }
    }
}

/// Decodes a `T` from `bytes` in `format`.
pub fn decode<T: DeserializeOwned>(format: WireFormat, bytes: &[u8]) -> CodecResult<T> {
    match format {
        WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
        WireFormat::Cbor => {
            ciborium::from_reader(bytes).map_err(|e| CodecError::CborDecode(e.to_string()))
        }
    }
}
