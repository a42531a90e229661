//! Dedicated writer task that owns the socket's write half.
//!
//! Every outbound frame goes through one mpsc channel into one task, so
//! writes from concurrent callers never interleave on the wire.
//!
//! ```text
//! command() ─┐
//! subscribe()─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! router PONG ─┘
//! ```
//!
//! Frames that are already queued when the task wakes up are written as one
//! batch with a single flush.

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{IpcError, Result};
use crate::protocol::{encode_frame, Opcode};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Maximum frames to batch in a single flush.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Opcode, kept for logging.
    pub opcode: Opcode,
    /// Header and JSON body, contiguous.
    pub bytes: Bytes,
}

impl OutboundFrame {
    /// Encode a payload into an outbound frame.
    pub fn encode<T: Serialize>(opcode: Opcode, payload: &T) -> Result<Self> {
        Ok(Self {
            opcode,
            bytes: encode_frame(opcode, payload)?,
        })
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheap to clone; every clone feeds the same task.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting while the channel is full.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| IpcError::ConnectionClosed)
    }

    /// Check whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every [`WriterHandle`] is dropped, and with
/// an error on the first failed write.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("IPC write failed: {}", e);
            return Err(e);
        }
        batch.clear();
    }

    // Channel closed, clean shutdown
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of frames followed by one flush.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for frame in batch {
        writer.write_all(&frame.bytes).await?;
        tracing::trace!(opcode = %frame.opcode, size = frame.size(), "Frame written");
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;
    use serde_json::json;
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_outbound_frame_encode() {
        let frame = OutboundFrame::encode(Opcode::Frame, &json!({"cmd": "X"})).unwrap();
        assert_eq!(frame.opcode, Opcode::Frame);
        assert_eq!(frame.size(), 8 + br#"{"cmd":"X"}"#.len());
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        let frame = OutboundFrame::encode(Opcode::Ping, &json!({"n": 1})).unwrap();
        let expected = frame.size();
        handle.send(frame).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(n, expected);
    }

    #[tokio::test]
    async fn test_writes_keep_submission_order() {
        let (client, mut server) = duplex(64 * 1024);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for i in 0..20 {
            let frame = OutboundFrame::encode(Opcode::Frame, &json!({ "i": i })).unwrap();
            handle.send(frame).await.unwrap();
        }
        drop(handle);

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();

        let mut buffer = FrameBuffer::new();
        let order: Vec<i64> = buffer
            .decode(&bytes)
            .map(|f| f.unwrap().payload["i"].as_i64().unwrap())
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());

        let batch: Vec<_> = (0..5)
            .map(|i| OutboundFrame::encode(Opcode::Frame, &json!({ "i": i })).unwrap())
            .collect();
        let total: usize = batch.iter().map(OutboundFrame::size).sum();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), total);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_after_writer_stopped() {
        let (client, server) = duplex(16);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());
        drop(server);

        let frame = OutboundFrame::encode(Opcode::Frame, &json!({"cmd": "X"})).unwrap();
        handle.send(frame.clone()).await.unwrap();
        assert!(task.await.unwrap().is_err());

        let result = handle.send(frame).await;
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
        assert!(handle.is_closed());
    }
}
