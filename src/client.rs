//! Client builder and runtime loop.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the
//! connection and registering event handlers. The [`Client`] manages the
//! lifecycle:
//! 1. Locate the IPC socket
//! 2. Send HANDSHAKE and wait for the `READY` reply
//! 3. Spawn writer, reader and router tasks
//! 4. Correlate command replies by nonce and fan out dispatched events
//!
//! # Example
//!
//! ```ignore
//! use discord_ipc_client::Client;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .client_id(192_741_864_418_312_192)
//!         .on("message_create", |event| async move {
//!             println!("{}", event.data["message"]["content"]);
//!             Ok(())
//!         })
//!         .connect()
//!         .await?;
//!
//!     client
//!         .subscribe("message_create", json!({"channel_id": "123"}))
//!         .await?;
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::JsonCodec;
use crate::control::{check_handshake_reply, CommandPayload, HandshakePayload};
use crate::correlator::RequestCorrelator;
use crate::error::{IpcError, Result};
use crate::handler::{
    DispatchMode, Event, EventDispatcher, FnHandler, Handler, HandlerId, HandlerResult,
    TypedHandler,
};
use crate::protocol::{encode_frame, Frame, FrameBuffer, Opcode, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::transport::locate;
use crate::writer::{
    spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle, DEFAULT_CHANNEL_CAPACITY,
};

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and connecting a [`Client`].
pub struct ClientBuilder {
    client_id: Option<u64>,
    dispatch_mode: DispatchMode,
    request_timeout: Option<Duration>,
    channel_capacity: usize,
    max_payload_size: u32,
    handlers: Vec<(String, Arc<dyn Handler>)>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            client_id: None,
            dispatch_mode: DispatchMode::default(),
            request_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            handlers: Vec::new(),
        }
    }

    /// Set the application id sent in the handshake. Required.
    pub fn client_id(mut self, client_id: u64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Set how many event handlers may run at once.
    ///
    /// Default: [`DispatchMode::Unbounded`]
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Fail commands that get no reply within `timeout`.
    ///
    /// Default: wait indefinitely.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the capacity of the writer and router channels.
    ///
    /// Default: 256
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the largest inbound payload accepted.
    ///
    /// Default: 64 MiB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Register a handler receiving the raw [`Event`].
    pub fn on<F, Fut>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .push((event.to_string(), Arc::new(FnHandler::new(handler))));
        self
    }

    /// Register a handler receiving the event data deserialized as `T`.
    pub fn on_typed<F, T, Fut>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .push((event.to_string(), Arc::new(TypedHandler::new(handler))));
        self
    }

    /// Locate the IPC socket and connect.
    pub async fn connect(self) -> Result<Client> {
        let stream = locate().await?;
        self.connect_stream(stream).await
    }

    /// Run the handshake over an already open stream and start the client.
    pub async fn connect_stream<S>(self, mut stream: S) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let client_id = self
            .client_id
            .ok_or_else(|| IpcError::Config("client_id is required".to_string()))?;

        // 1. Handshake directly on the stream
        let mut frame_buffer = FrameBuffer::with_max_payload(self.max_payload_size);
        let ready = handshake(&mut stream, client_id, &mut frame_buffer).await?;
        tracing::info!(client_id, "Handshake complete");

        // 2. Handlers registered before connecting
        let dispatcher = EventDispatcher::new(self.dispatch_mode);
        for (event, handler) in self.handlers {
            dispatcher.register_handler(&event, handler);
        }

        let shared = Arc::new(Shared {
            correlator: RequestCorrelator::new(),
            dispatcher,
            connected: AtomicBool::new(true),
        });

        // 3. Split stream and spawn the writer
        let (read_half, write_half) = tokio::io::split(stream);
        let writer_config = WriterConfig {
            channel_capacity: self.channel_capacity,
        };
        let (writer, writer_task) = spawn_writer_task(write_half, writer_config);

        // 4. Reader publishes frames, router consumes them
        let (frame_tx, frame_rx) = mpsc::channel(self.channel_capacity);
        let reader_task = tokio::spawn(async move {
            if let Err(e) = read_loop(read_half, frame_buffer, frame_tx).await {
                tracing::error!("Read loop error: {}", e);
            }
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let router_shared = Arc::clone(&shared);
        let router_writer = writer.clone();
        tokio::spawn(async move {
            route_loop(frame_rx, &router_shared, router_writer).await;

            router_shared.connected.store(false, Ordering::SeqCst);
            router_shared.correlator.fail_all();
            tracing::info!("IPC connection closed");
            let _ = shutdown_tx.send(());
        });

        Ok(Client {
            shared,
            writer: Some(writer),
            ready,
            request_timeout: self.request_timeout,
            shutdown_rx,
            reader_task,
            writer_task,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the client and the router task.
struct Shared {
    correlator: RequestCorrelator,
    dispatcher: EventDispatcher,
    connected: AtomicBool,
}

/// A connected IPC client.
///
/// Use `command()` and `subscribe()` to talk to the peer.
/// Use `wait_for_shutdown()` to block until the connection closes.
///
/// Dropping the client stops its background tasks and closes the socket.
pub struct Client {
    shared: Arc<Shared>,
    /// Taken by `close()` so the writer can drain and shut down.
    writer: Option<WriterHandle>,
    /// Payload of the handshake reply.
    ready: Value,
    request_timeout: Option<Duration>,
    shutdown_rx: oneshot::Receiver<()>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Send a command and wait for the frame carrying its nonce.
    ///
    /// The reply is returned as-is, including `evt: "ERROR"` replies; the
    /// caller decides what an error means for its command.
    pub async fn command<A: Serialize>(&self, cmd: &str, args: A) -> Result<Frame> {
        let args = JsonCodec::to_value(&args)?;
        self.request(|nonce| CommandPayload::command(cmd, args, nonce))
            .await
    }

    /// Subscribe to `event`. An ERROR acknowledgement is an error.
    pub async fn subscribe<A: Serialize>(&self, event: &str, args: A) -> Result<Frame> {
        let args = JsonCodec::to_value(&args)?;
        let reply = self
            .request(|nonce| CommandPayload::subscribe(event, args, nonce))
            .await?;
        check_ack(reply)
    }

    /// Remove a subscription. An ERROR acknowledgement is an error.
    pub async fn unsubscribe<A: Serialize>(&self, event: &str, args: A) -> Result<Frame> {
        let args = JsonCodec::to_value(&args)?;
        let reply = self
            .request(|nonce| CommandPayload::unsubscribe(event, args, nonce))
            .await?;
        check_ack(reply)
    }

    /// Send a raw frame without waiting for a reply.
    pub async fn send_frame<T: Serialize>(&self, opcode: Opcode, payload: &T) -> Result<()> {
        self.ensure_connected()?;
        let frame = OutboundFrame::encode(opcode, payload)?;
        self.writer()?.send(frame).await
    }

    /// Register a handler after connecting.
    pub fn on<F, Fut>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.shared.dispatcher.register(event, handler)
    }

    /// Register a typed handler after connecting.
    pub fn on_typed<F, T, Fut>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.shared.dispatcher.register_typed(event, handler)
    }

    /// Remove a handler registration.
    pub fn off(&self, id: HandlerId) -> bool {
        self.shared.dispatcher.unregister(id)
    }

    /// The handshake reply (the `READY` dispatch).
    pub fn ready(&self) -> &Value {
        &self.ready
    }

    /// Check whether the read side is still running.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Number of commands waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    /// Send CLOSE, stop the background tasks and flush the writer.
    pub async fn close(mut self) -> Result<()> {
        if self.is_connected() {
            let frame = OutboundFrame::encode(Opcode::Close, &json!({}))?;
            if let Err(e) = self.writer()?.send(frame).await {
                tracing::debug!("CLOSE not sent: {}", e);
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        self.reader_task.abort();

        // Router exit drops the last other writer handle
        self.writer = None;
        let _ = (&mut self.shutdown_rx).await;

        match (&mut self.writer_task).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(IpcError::Protocol(format!("Writer task failed: {}", e))),
        }
    }

    /// Wait for shutdown (peer CLOSE or socket closed).
    ///
    /// This consumes the client and blocks until the connection closes.
    pub async fn wait_for_shutdown(mut self) -> Result<()> {
        let _ = (&mut self.shutdown_rx).await;
        Ok(())
    }

    fn writer(&self) -> Result<&WriterHandle> {
        self.writer.as_ref().ok_or(IpcError::NotConnected)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(IpcError::NotConnected)
        }
    }

    /// Register a nonce, write the payload built for it, await the reply.
    async fn request<F>(&self, build: F) -> Result<Frame>
    where
        F: FnOnce(&str) -> CommandPayload,
    {
        self.ensure_connected()?;

        // Register before writing so a fast reply cannot miss its waiter
        let pending = self.shared.correlator.register();
        let nonce = pending.nonce().to_string();

        // The router may have torn down between the check and the register
        if !self.is_connected() {
            self.shared.correlator.cancel(&nonce);
            return Err(IpcError::NotConnected);
        }

        let payload = build(&nonce);
        let sent = match OutboundFrame::encode(Opcode::Frame, &payload) {
            Ok(frame) => {
                tracing::debug!(nonce = %nonce, cmd = %payload.cmd, "Sending command");
                match self.writer() {
                    Ok(writer) => writer.send(frame).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            self.shared.correlator.cancel(&nonce);
            return Err(match e {
                IpcError::ConnectionClosed => IpcError::NotConnected,
                other => other,
            });
        }

        match self.request_timeout {
            None => pending.await,
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    self.shared.correlator.cancel(&nonce);
                    tracing::warn!(nonce = %nonce, "Request timed out");
                    Err(IpcError::Timeout)
                }
            },
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Reader exit ends the router, which releases its writer handle
        self.reader_task.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.is_connected())
            .field("pending_requests", &self.pending_requests())
            .field("dispatcher", &self.shared.dispatcher)
            .finish()
    }
}

/// Turn an ERROR acknowledgement into [`IpcError::Command`].
fn check_ack(reply: Frame) -> Result<Frame> {
    if reply.is_error() {
        let (code, message) = reply.error_details();
        return Err(IpcError::Command { code, message });
    }
    Ok(reply)
}

/// Write HANDSHAKE and read until the first complete frame arrives.
///
/// Bytes past that frame stay in `buffer` for the read loop.
async fn handshake<S>(stream: &mut S, client_id: u64, buffer: &mut FrameBuffer) -> Result<Value>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = encode_frame(Opcode::Handshake, &HandshakePayload::new(client_id))?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        if let Some(frame) = buffer.try_decode_one()? {
            tracing::debug!(opcode = %frame.opcode, "Handshake reply: {}", frame.payload);
            return check_handshake_reply(frame);
        }

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }
        buffer.push(&buf[..n]);
    }
}

/// Read loop - decodes frames and publishes them to the router.
///
/// Malformed JSON in a complete frame is skipped; header errors end the loop.
async fn read_loop<R>(mut reader: R, mut buffer: FrameBuffer, frames: mpsc::Sender<Frame>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        for result in buffer.frames() {
            match result {
                Ok(frame) => {
                    if frames.send(frame).await.is_err() {
                        // Router is gone
                        return Ok(());
                    }
                }
                Err(IpcError::Decode(e)) => {
                    tracing::warn!("Skipping frame with malformed payload: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.push(&buf[..n]);
    }
}

/// Router loop - answers PING, resolves replies and dispatches events.
async fn route_loop(mut frames: mpsc::Receiver<Frame>, shared: &Shared, writer: WriterHandle) {
    while let Some(frame) = frames.recv().await {
        tracing::debug!(opcode = %frame.opcode, "Received payload: {}", frame.payload);

        match frame.opcode {
            Opcode::Ping => {
                let pong = match OutboundFrame::encode(Opcode::Pong, &frame.payload) {
                    Ok(pong) => pong,
                    Err(e) => {
                        tracing::warn!("Failed to encode PONG: {}", e);
                        continue;
                    }
                };
                if let Err(e) = writer.send(pong).await {
                    tracing::warn!("Failed to send PONG: {}", e);
                }
            }
            Opcode::Close => {
                let code = frame.payload.get("code").and_then(Value::as_i64);
                let message = frame.payload.get("message").and_then(Value::as_str);
                tracing::info!(?code, ?message, "Peer closed the connection");
                break;
            }
            Opcode::Frame => route_frame(shared, &frame),
            other => tracing::debug!("Ignoring {} frame", other),
        }
    }
}

fn route_frame(shared: &Shared, frame: &Frame) {
    if frame.is_dispatch() {
        let name = frame.evt().unwrap_or("DISPATCH");
        let data = frame.data().cloned().unwrap_or(Value::Null);
        let spawned = shared.dispatcher.dispatch(name, data);
        tracing::debug!(event = %name, handlers = spawned, "Dispatched event");
    }

    shared.correlator.resolve(frame);
}
