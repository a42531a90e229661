//! Handshake payload and reply check.
//!
//! The first frame on a new connection is a HANDSHAKE carrying the protocol
//! version and the application's client id. The peer answers with a
//! `READY` dispatch on success, an error payload for an unknown client id,
//! or a CLOSE frame.
//!
//! # Example
//!
//! ```
//! use discord_ipc_client::control::HandshakePayload;
//!
//! let payload = HandshakePayload::new(192_741_864_418_312_192);
//! let json = serde_json::to_string(&payload).unwrap();
//! assert_eq!(json, r#"{"v":1,"client_id":"192741864418312192"}"#);
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::error::{IpcError, Result};
use crate::protocol::{Frame, Opcode};

/// IPC protocol version sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Error message the peer sends for an unknown application id.
pub const INVALID_CLIENT_ID_MESSAGE: &str = "Invalid Client ID";

/// Body of the HANDSHAKE frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandshakePayload {
    /// Protocol version.
    pub v: u32,
    /// Application id, as a decimal string.
    pub client_id: String,
}

impl HandshakePayload {
    /// Build the handshake for `client_id`.
    pub fn new(client_id: u64) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            client_id: client_id.to_string(),
        }
    }
}

/// Check the first frame received after the handshake.
///
/// Returns the `READY` payload on success.
pub fn check_handshake_reply(frame: Frame) -> Result<Value> {
    if frame.opcode == Opcode::Close {
        let code = frame
            .payload
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let message = frame
            .payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if message == INVALID_CLIENT_ID_MESSAGE {
            return Err(IpcError::InvalidClientId);
        }
        return Err(IpcError::HandshakeRejected { code, message });
    }

    let message = frame.payload.get("message").and_then(Value::as_str);
    let data_message = frame
        .data()
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str);

    if message == Some(INVALID_CLIENT_ID_MESSAGE) || data_message == Some(INVALID_CLIENT_ID_MESSAGE)
    {
        return Err(IpcError::InvalidClientId);
    }

    if frame.opcode != Opcode::Frame {
        return Err(IpcError::Protocol(format!(
            "Unexpected {} frame in reply to handshake",
            frame.opcode
        )));
    }

    Ok(frame.payload)
}
