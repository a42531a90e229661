//! JSON codec using `serde_json`.
//!
//! Every IPC payload is a UTF-8 JSON document. Encoding and decoding errors
//! are kept apart: an encode failure is a local [`IpcError::Serialization`]
//! that never touches connection state, while a decode failure is an
//! [`IpcError::Decode`] raised for a frame that was already fully received.
//!
//! # Example
//!
//! ```
//! use discord_ipc_client::codec::JsonCodec;
//! use serde_json::json;
//!
//! let encoded = JsonCodec::encode(&json!({"cmd": "AUTHENTICATE"})).unwrap();
//! let decoded: serde_json::Value = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["cmd"], "AUTHENTICATE");
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{IpcError, Result};

/// JSON codec for frame payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON bytes.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(IpcError::Serialization)
    }

    /// Decode JSON bytes into a value.
    ///
    /// Callers must only pass a complete payload.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(IpcError::Decode)
    }

    /// Convert any serializable value into a `serde_json::Value`.
    #[inline]
    pub fn to_value<T: Serialize>(value: &T) -> Result<Value> {
        serde_json::to_value(value).map_err(IpcError::Serialization)
    }

    /// Convert a `serde_json::Value` into a typed value.
    #[inline]
    pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(IpcError::Decode)
    }
}
