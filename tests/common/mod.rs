//! Fake desktop-app peer over an in-memory duplex stream.

#![allow(dead_code)]

use std::time::Duration;

use discord_ipc_client::protocol::{encode_frame, Frame, FrameBuffer, Opcode};
use discord_ipc_client::{Client, ClientBuilder};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const CLIENT_ID: u64 = 192_741_864_418_312_192;

/// The desktop side of a connection.
pub struct FakePeer {
    stream: DuplexStream,
    buffer: FrameBuffer,
}

impl FakePeer {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::new(),
        }
    }

    /// Read the next frame the client wrote.
    pub async fn recv(&mut self) -> Frame {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.buffer.try_decode_one().unwrap() {
                return frame;
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed the stream");
            self.buffer.push(&buf[..n]);
        }
    }

    /// Read until the client closes its write half; returns frames seen.
    pub async fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            while let Some(frame) = self.buffer.try_decode_one().unwrap() {
                frames.push(frame);
            }
            match self.stream.read(&mut buf).await {
                Ok(0) | Err(_) => return frames,
                Ok(n) => self.buffer.push(&buf[..n]),
            }
        }
    }

    pub async fn send(&mut self, opcode: Opcode, payload: Value) {
        let bytes = encode_frame(opcode, &payload).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Answer `request` with `data`, echoing its cmd and nonce.
    pub async fn reply(&mut self, request: &Frame, data: Value) {
        let payload = json!({
            "cmd": request.cmd(),
            "data": data,
            "evt": null,
            "nonce": request.nonce(),
        });
        self.send(Opcode::Frame, payload).await;
    }

    /// Answer `request` with an ERROR event.
    pub async fn reply_error(&mut self, request: &Frame, code: i64, message: &str) {
        let payload = json!({
            "cmd": request.cmd(),
            "data": {"code": code, "message": message},
            "evt": "ERROR",
            "nonce": request.nonce(),
        });
        self.send(Opcode::Frame, payload).await;
    }

    /// Read the HANDSHAKE and answer with READY.
    pub async fn accept_handshake(&mut self) -> Frame {
        let hello = self.recv().await;
        self.send(Opcode::Frame, ready_payload()).await;
        hello
    }
}

pub fn ready_payload() -> Value {
    json!({
        "cmd": "DISPATCH",
        "data": {
            "v": 1,
            "config": {"cdn_host": "cdn.discordapp.com", "api_endpoint": "//discord.com/api"},
            "user": {"id": "1", "username": "wumpus"}
        },
        "evt": "READY",
        "nonce": null
    })
}

/// Connect a client built from `builder` to a fresh fake peer.
pub async fn connect(builder: ClientBuilder) -> (Client, FakePeer) {
    let (client_side, peer_side) = tokio::io::duplex(256 * 1024);
    let mut peer = FakePeer::new(peer_side);

    let (client, _hello) = tokio::join!(
        builder.client_id(CLIENT_ID).connect_stream(client_side),
        peer.accept_handshake()
    );
    (client.unwrap(), peer)
}

/// Wait until the client notices the connection is gone.
pub async fn wait_disconnected(client: &Client) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while client.is_connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client never disconnected");
}
