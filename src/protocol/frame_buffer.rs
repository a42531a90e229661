//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 8 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! JSON is only parsed once exactly `payload_length` bytes are buffered, so a
//! short read is always "not yet complete" and never a decode error.
//!
//! # Example
//!
//! ```ignore
//! use discord_ipc_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! for frame in buffer.decode(&chunk) {
//!     println!("Got {:?}", frame?.opcode);
//! }
//! ```

use bytes::BytesMut;
use serde_json::Value;

use super::wire_format::{Header, Opcode, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::codec::JsonCodec;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for complete header (need 8 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { opcode: Opcode, length: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Owned by exactly one reader; bytes are only ever consumed by
/// [`FrameBuffer::try_decode_one`].
#[derive(Debug)]
pub struct FrameBuffer {
    /// Bytes received but not yet decoded.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 64MB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Lazily extract every complete frame currently buffered.
    ///
    /// The iterator ends as soon as more bytes are needed. A `Decode` error
    /// for one frame does not stop it; the next item is the following frame.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { buffer: self }
    }

    /// Append `data` and extract every complete frame.
    pub fn decode(&mut self, data: &[u8]) -> Frames<'_> {
        self.push(data);
        self.frames()
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(Decode)` if a complete frame held invalid JSON (its bytes are consumed)
    /// - `Err(Protocol)` on an unknown opcode or oversized length (buffer is cleared)
    pub fn try_decode_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    let header = match Header::decode(&self.buffer) {
                        Some(header) => header,
                        None => return Ok(None),
                    };

                    let opcode = match header.validate(self.max_payload_size) {
                        Ok(opcode) => opcode,
                        Err(e) => {
                            // Stream alignment is lost; nothing after this is trustworthy.
                            self.clear();
                            return Err(e);
                        }
                    };

                    let _ = self.buffer.split_to(HEADER_SIZE);
                    self.state = State::WaitingForPayload {
                        opcode,
                        length: header.payload_length as usize,
                    };
                }

                State::WaitingForPayload { opcode, length } => {
                    if self.buffer.len() < length {
                        return Ok(None);
                    }

                    let body = self.buffer.split_to(length).freeze();
                    self.state = State::WaitingForHeader;

                    let payload = if body.is_empty() {
                        Value::Null
                    } else {
                        JsonCodec::decode(&body)?
                    };

                    return Ok(Some(Frame::new(opcode, payload)));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the complete frames in a [`FrameBuffer`].
#[derive(Debug)]
pub struct Frames<'a> {
    buffer: &'a mut FrameBuffer,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.try_decode_one().transpose()
    }
}
