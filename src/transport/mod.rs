//! Transport module - IPC socket discovery and connection.
//!
//! Provides:
//! - Socket path resolution from the environment
//! - Connection attempts across `discord-ipc-0..9`

mod locator;

pub use locator::{
    base_dir, base_dir_from, ipc_path, locate, locate_in, locate_with, IpcStream,
    BASE_DIR_VARS, FALLBACK_BASE_DIR, MAX_SOCKET_INDEX,
};
