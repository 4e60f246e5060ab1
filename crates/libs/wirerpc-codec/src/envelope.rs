use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// One call as placed on the wire. Encoded positionally as
/// `[method, params, id]`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct RequestEnvelope {
    pub method: String,
    #[serde(with = "serde_bytes", default)]
    pub params: Vec<u8>,
    pub id: u64,
}

/// The single reply to a [`RequestEnvelope`] with the same `id`. Encoded
/// positionally as `[id, result, error]`; an empty `error` means success and
/// `result` is then the only meaningful field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(with = "serde_bytes", default)]
    pub result: Vec<u8>,
    #[serde(default)]
    pub error: String,
}

impl RequestEnvelope {
    /// Envelope bytes without the length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_envelope(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_envelope(bytes, "request")
    }
}

impl ResponseEnvelope {
    pub fn success(id: u64, result: Vec<u8>) -> Self {
        Self {
            id,
            result,
            error: String::new(),
        }
    }

    pub fn failure(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            result: Vec::new(),
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_envelope(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_envelope(bytes, "response")
    }
}

// Envelopes are positional arrays; only payloads use field names.
fn encode_envelope<T: serde::Serialize>(envelope: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(envelope).map_err(CodecError::not_serializable)
}

fn decode_envelope<T: serde::de::DeserializeOwned>(bytes: &[u8], kind: &str) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|err| CodecError::protocol(format!("malformed {kind} envelope: {err}")))
}
