//! Event value passed to handlers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::Result;

/// A dispatched event: its name as received and its `data` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name as sent by the peer (e.g. `MESSAGE_CREATE`).
    pub name: String,
    /// The frame's `data` object, `Null` if absent.
    pub data: Value,
}

impl Event {
    /// Create an event.
    pub fn new(name: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    /// Deserialize the data into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::from_value(self.data.clone())
    }
}
