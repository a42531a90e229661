//! IPC socket discovery.
//!
//! The desktop client listens on the first free of
//! `<base>/discord-ipc-0` .. `<base>/discord-ipc-9`, where `<base>` is the
//! first non-empty of `XDG_RUNTIME_DIR`, `TMPDIR`, `TMP`, `TEMP`, else `/tmp`.
//!
//! # Example
//!
//! ```ignore
//! use discord_ipc_client::transport::locate;
//!
//! let stream = locate().await?;
//! ```

use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;

use crate::error::{IpcError, Result};

/// Number of socket indices tried before giving up.
pub const MAX_SOCKET_INDEX: u8 = 10;

/// Environment variables consulted for the socket directory, in order.
pub const BASE_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Directory used when none of [`BASE_DIR_VARS`] is set.
pub const FALLBACK_BASE_DIR: &str = "/tmp";

/// Resolve the socket base directory from the process environment.
///
/// Values need not be valid UTF-8.
pub fn base_dir() -> PathBuf {
    base_dir_from(|name| std::env::var_os(name))
}

/// Resolve the socket base directory with a custom variable lookup.
pub fn base_dir_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    let base = BASE_DIR_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| OsString::from(FALLBACK_BASE_DIR));

    let bytes = base.as_bytes();
    let end = bytes.iter().rposition(|&b| b != b'/').map_or(0, |i| i + 1);
    if end == 0 {
        PathBuf::from("/")
    } else {
        PathBuf::from(OsStr::from_bytes(&bytes[..end]))
    }
}

/// Socket path for the given index under `base`.
pub fn ipc_path(base: impl AsRef<Path>, index: u8) -> PathBuf {
    base.as_ref().join(format!("discord-ipc-{}", index))
}

/// Connect to the first live socket under the environment's base directory.
pub async fn locate() -> Result<IpcStream> {
    locate_in(base_dir()).await
}

/// Connect to the first live socket under `base`.
pub async fn locate_in(base: impl AsRef<Path>) -> Result<IpcStream> {
    locate_with(base, |path| async move {
        UnixStream::connect(&path).await.map(|stream| IpcStream { stream, path })
    })
    .await
}

/// Try `connect` on each candidate path under `base`, in index order.
///
/// `NotFound` and `ConnectionRefused` advance to the next index; any other
/// I/O error is returned as is. After [`MAX_SOCKET_INDEX`] misses this fails
/// with [`IpcError::ConnectionExhausted`].
pub async fn locate_with<S, F, Fut>(base: impl AsRef<Path>, mut connect: F) -> Result<S>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<S>>,
{
    let base = base.as_ref();

    for index in 0..MAX_SOCKET_INDEX {
        let path = ipc_path(base, index);
        match connect(path.clone()).await {
            Ok(stream) => {
                tracing::info!(path = %path.display(), "Connected to IPC socket");
                return Ok(stream);
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
                tracing::debug!(path = %path.display(), error = %e, "IPC socket unavailable");
            }
            Err(e) => return Err(IpcError::Io(e)),
        }
    }

    Err(IpcError::ConnectionExhausted {
        base: base.display().to_string(),
    })
}

/// A connected IPC socket.
#[derive(Debug)]
pub struct IpcStream {
    stream: UnixStream,
    path: PathBuf,
}

impl IpcStream {
    /// Path of the socket this stream is connected to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsyncRead for IpcStream {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for IpcStream {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::pin::Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
