//! # discord-ipc-client
//!
//! Async client for the Discord desktop app's local IPC (RPC) protocol.
//!
//! The desktop app listens on a Unix socket named `discord-ipc-N`. Every
//! message is a frame: a little-endian `u32` opcode, a little-endian `u32`
//! payload length and a UTF-8 JSON payload.
//!
//! ## Architecture
//!
//! - **Transport**: socket discovery and a single writer task
//! - **Protocol**: frame encoding and incremental decoding
//! - **Correlator**: nonce-keyed request/response matching
//! - **Dispatcher**: fan-out of pushed events to registered handlers
//! - **Auth**: AUTHORIZE, OAuth token exchange, AUTHENTICATE
//!
//! ## Example
//!
//! ```ignore
//! use discord_ipc_client::{AuthManager, Client, HttpTokenExchange, JsonFileStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut auth = AuthManager::load(JsonFileStore::new("config.json"), HttpTokenExchange::new())?;
//!
//!     let client = Client::builder()
//!         .client_id(auth.config().client_id)
//!         .connect()
//!         .await?;
//!
//!     auth.authorize(&client).await?;
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod control;
pub mod correlator;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;

pub use auth::{AuthManager, AuthState, HttpTokenExchange, Identity, OAuthSettings, TokenExchange};
pub use client::{Client, ClientBuilder};
pub use config::{AccessToken, ClientConfig, ConfigStore, JsonFileStore};
pub use error::{IpcError, Result};
pub use handler::{DispatchMode, Event, HandlerId};
pub use protocol::{Frame, Opcode};
