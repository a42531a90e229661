//! Frame struct with typed accessors.
//!
//! A decoded frame is an opcode plus a parsed JSON payload. The accessors
//! cover the handful of top-level keys the client routes on (`cmd`, `evt`,
//! `nonce`, `data`).
//!
//! # Example
//!
//! ```
//! use discord_ipc_client::protocol::{encode_frame, Frame, FrameBuffer, Opcode};
//! use serde_json::json;
//!
//! let bytes = encode_frame(Opcode::Frame, &json!({"cmd": "DISPATCH", "evt": "READY"})).unwrap();
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.push(&bytes);
//! let frame: Frame = buffer.frames().next().unwrap().unwrap();
//!
//! assert_eq!(frame.opcode, Opcode::Frame);
//! assert_eq!(frame.evt(), Some("READY"));
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use super::wire_format::{Header, Opcode, HEADER_SIZE};
use crate::codec::JsonCodec;
use crate::error::{IpcError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame opcode.
    pub opcode: Opcode,
    /// Parsed JSON payload.
    pub payload: Value,
}

impl Frame {
    /// Create a new frame.
    pub fn new(opcode: Opcode, payload: Value) -> Self {
        Self { opcode, payload }
    }

    /// Top-level `cmd` string, if present.
    #[inline]
    pub fn cmd(&self) -> Option<&str> {
        self.payload.get("cmd").and_then(Value::as_str)
    }

    /// Top-level `evt` string, if present.
    #[inline]
    pub fn evt(&self) -> Option<&str> {
        self.payload.get("evt").and_then(Value::as_str)
    }

    /// Top-level `nonce` string, if present.
    #[inline]
    pub fn nonce(&self) -> Option<&str> {
        self.payload.get("nonce").and_then(Value::as_str)
    }

    /// The `data` object, if present.
    #[inline]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }

    /// Check if this frame pushes an event rather than answering a request.
    ///
    /// Both the current `{cmd: "DISPATCH", evt: <name>}` shape and the
    /// older `{evt: "DISPATCH"}` shape count.
    pub fn is_dispatch(&self) -> bool {
        self.opcode == Opcode::Frame
            && (self.cmd() == Some("DISPATCH") || self.evt() == Some("DISPATCH"))
    }

    /// Check if this frame is an ERROR event reply.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.evt() == Some("ERROR")
    }

    /// Error `(code, message)` carried in `data` of an ERROR reply.
    pub fn error_details(&self) -> (i64, String) {
        let data = self.data();
        let code = data
            .and_then(|d| d.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let message = data
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        (code, message)
    }
}

/// Encode a payload into a complete frame (header + JSON body).
///
/// The header's length field is always the exact length of the JSON that
/// follows it.
pub fn encode_frame<T: Serialize>(opcode: Opcode, payload: &T) -> Result<Bytes> {
    let body = JsonCodec::encode(payload)?;
    let length = u32::try_from(body.len()).map_err(|_| {
        IpcError::Protocol(format!("Payload of {} bytes does not fit a frame", body.len()))
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_slice(&Header::new(opcode, length).encode());
    buf.put_slice(&body);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_frame_layout() {
        let payload = json!({"v": 1, "client_id": "42"});
        let bytes = encode_frame(Opcode::Handshake, &payload).unwrap();

        let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.opcode, 0);
        assert_eq!(header.payload_length as usize, bytes.len() - HEADER_SIZE);

        let body: Value = serde_json::from_slice(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(body, payload);
    }

    #[test]
    fn test_length_counts_bytes_not_chars() {
        let payload = json!({"content": "zażółć 🦀"});
        let bytes = encode_frame(Opcode::Frame, &payload).unwrap();

        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.payload_length as usize, bytes.len() - HEADER_SIZE);
    }

    #[test]
    fn test_accessors() {
        let frame = Frame::new(
            Opcode::Frame,
            json!({"cmd": "DISPATCH", "evt": "MESSAGE_CREATE", "data": {"id": "1"}, "nonce": null}),
        );

        assert_eq!(frame.cmd(), Some("DISPATCH"));
        assert_eq!(frame.evt(), Some("MESSAGE_CREATE"));
        assert_eq!(frame.nonce(), None);
        assert_eq!(frame.data().unwrap()["id"], "1");
        assert!(frame.is_dispatch());
        assert!(!frame.is_error());
    }

    #[test]
    fn test_legacy_dispatch_shape() {
        let frame = Frame::new(Opcode::Frame, json!({"evt": "DISPATCH", "data": {}}));
        assert!(frame.is_dispatch());
    }

    #[test]
    fn test_command_reply_is_not_dispatch() {
        let frame = Frame::new(
            Opcode::Frame,
            json!({"cmd": "SUBSCRIBE", "evt": "MESSAGE_CREATE", "nonce": "ab"}),
        );
        assert!(!frame.is_dispatch());
    }

    #[test]
    fn test_error_details() {
        let frame = Frame::new(
            Opcode::Frame,
            json!({"cmd": "AUTHENTICATE", "evt": "ERROR", "data": {"code": 4009, "message": "Invalid access token"}}),
        );

        assert!(frame.is_error());
        assert_eq!(frame.error_details(), (4009, "Invalid access token".to_string()));
    }

    #[test]
    fn test_error_details_missing_data() {
        let frame = Frame::new(Opcode::Frame, json!({"evt": "ERROR"}));
        assert_eq!(frame.error_details(), (0, "unknown error".to_string()));
    }
}
