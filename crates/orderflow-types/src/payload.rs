use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ExecutionError};

/// Codec used to encode/decode payload bytes.
///
/// `Cbor` and `Borsh` are carried for wire forward-compatibility but unused
/// by this crate: every domain input/output is encoded as `Json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    Json,
    Cbor,
    Borsh,
}

/// Opaque bytes with an associated codec, crossing the boundary between the
/// engine (which only ever moves bytes) and typed workflow/effect code
/// (which serializes/deserializes them).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub codec: Codec,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, codec: Codec) -> Self {
        Self { bytes, codec }
    }

    pub fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            codec: Codec::Json,
        }
    }

    /// Serializes `value` to JSON and wraps it as a `Payload`.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, ExecutionError> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            ExecutionError::new(ErrorKind::ValidationError, "failed to encode payload")
                .with_detail(e.to_string())
        })?;
        Ok(Self::new(bytes, Codec::Json))
    }

    /// Deserializes the payload as JSON into `T`.
    pub fn to_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ExecutionError> {
        serde_json::from_slice(&self.bytes).map_err(|e| {
            ExecutionError::new(ErrorKind::ValidationError, "failed to decode payload")
                .with_detail(e.to_string())
        })
    }
}
