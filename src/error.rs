//! Error types for discord-ipc-client.

use thiserror::Error;

/// Main error type for all IPC operations.
#[derive(Debug, Error)]
pub enum IpcError {
    /// I/O error during socket or config file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound payload could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A complete frame carried a body that is not valid JSON.
    #[error("Malformed frame payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// Protocol error (unknown opcode, oversized frame, unexpected reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection is gone; nothing can be sent until a new `connect()`.
    #[error("Not connected to IPC")]
    NotConnected,

    /// None of the `discord-ipc-0..9` sockets accepted a connection.
    #[error("Failed to connect to IPC: no socket under {base} accepted a connection")]
    ConnectionExhausted {
        /// Base directory the candidates were built from.
        base: String,
    },

    /// The handshake was answered with "Invalid Client ID".
    #[error("Invalid client ID")]
    InvalidClientId,

    /// The peer closed the connection in response to the handshake.
    #[error("Handshake rejected ({code}): {message}")]
    HandshakeRejected {
        /// Close code sent by the peer.
        code: i64,
        /// Close message sent by the peer.
        message: String,
    },

    /// AUTHORIZE failed or the token endpoint refused the grant.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// AUTHENTICATE was answered with an ERROR event.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A command was answered with an ERROR event.
    #[error("Command error ({code}): {message}")]
    Command {
        /// Error code from the reply data.
        code: i64,
        /// Error message from the reply data.
        message: String,
    },

    /// Connection closed while a frame or response was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A request did not receive its response in time.
    #[error("Request timed out")]
    Timeout,

    /// HTTP failure talking to the OAuth token endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Persisted configuration could not be read.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using IpcError.
pub type Result<T> = std::result::Result<T, IpcError>;
