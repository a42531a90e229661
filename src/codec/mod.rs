//! Codec module - serialization/deserialization for payloads.
//!
//! The IPC protocol carries UTF-8 JSON in every frame, so there is a single
//! codec: [`JsonCodec`].
//!
//! Like the framing helpers, the codec is a marker struct with static
//! methods; there is nothing to configure per connection.

mod json;

pub use json::JsonCodec;
