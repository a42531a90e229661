//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary framing of the IPC socket:
//! - 8-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{encode_frame, Frame};
pub use frame_buffer::{FrameBuffer, Frames};
pub use wire_format::{Header, Opcode, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
