//! Control payloads - handshake and command bodies.
//!
//! Every connection starts with a HANDSHAKE frame; everything afterwards is
//! a FRAME carrying a command or an event.
//!
//! # Workflow
//!
//! 1. Client connects to `discord-ipc-N`
//! 2. Client sends HANDSHAKE `{v: 1, client_id}`
//! 3. Peer replies with a `READY` dispatch (or rejects the client id)
//! 4. Commands and subscriptions flow as FRAMEs, correlated by nonce

mod command;
mod handshake;

pub use command::{CommandPayload, SUBSCRIBE, UNSUBSCRIBE};
pub use handshake::{
    check_handshake_reply, HandshakePayload, INVALID_CLIENT_ID_MESSAGE, PROTOCOL_VERSION,
};
