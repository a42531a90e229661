//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌──────────┬──────────┬─────────────────────┐
//! │ Opcode   │ Length   │ Payload             │
//! │ 4 bytes  │ 4 bytes  │ `Length` bytes      │
//! │ uint32 LE│ uint32 LE│ UTF-8 JSON          │
//! └──────────┴──────────┴─────────────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian.

use std::fmt;

use crate::error::{IpcError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size (64 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Frame opcode, the first header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    /// First frame of a connection: protocol version and client id.
    Handshake = 0,
    /// Commands, responses and dispatched events.
    Frame = 1,
    /// Connection close, carries `{code, message}`.
    Close = 2,
    /// Keepalive request; answered with [`Opcode::Pong`].
    Ping = 3,
    /// Keepalive reply.
    Pong = 4,
}

impl Opcode {
    /// Raw wire value.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Opcode {
    type Error = IpcError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(IpcError::Protocol(format!("Unknown opcode {}", other))),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Handshake => "HANDSHAKE",
            Opcode::Frame => "FRAME",
            Opcode::Close => "CLOSE",
            Opcode::Ping => "PING",
            Opcode::Pong => "PONG",
        };
        f.write_str(name)
    }
}

/// Raw header as read from the wire.
///
/// The opcode stays a `u32` here so that an unknown value can be reported
/// after the header is parsed, instead of being mistaken for a short read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Opcode value.
    pub opcode: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(opcode: Opcode, payload_length: u32) -> Self {
        Self {
            opcode: opcode.as_u32(),
            payload_length,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use discord_ipc_client::protocol::{Header, Opcode};
    ///
    /// let bytes = Header::new(Opcode::Frame, 2).encode();
    /// assert_eq!(bytes, [1, 0, 0, 0, 2, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.opcode.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            opcode: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Validate the header and resolve its opcode.
    ///
    /// Checks:
    /// - Opcode is one of the five known values
    /// - Payload length doesn't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<Opcode> {
        let opcode = Opcode::try_from(self.opcode)?;

        if self.payload_length > max_payload_size {
            return Err(IpcError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        Ok(opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let header = Header::new(Opcode::Ping, 123_456);
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_little_endian_byte_order() {
        let header = Header::new(Opcode::Close, 0x0102_0304);
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[1, 0, 0, 0, 5, 0, 0]).is_none());
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::Handshake.as_u32(), 0);
        assert_eq!(Opcode::Frame.as_u32(), 1);
        assert_eq!(Opcode::Close.as_u32(), 2);
        assert_eq!(Opcode::Ping.as_u32(), 3);
        assert_eq!(Opcode::Pong.as_u32(), 4);

        for value in 0..5 {
            assert_eq!(Opcode::try_from(value).unwrap().as_u32(), value);
        }
    }

    #[test]
    fn test_validate_unknown_opcode_rejected() {
        let header = Header {
            opcode: 9,
            payload_length: 0,
        };
        let err = header.validate(DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(err.to_string().contains("Unknown opcode 9"));
    }

    #[test]
    fn test_validate_oversized_payload_rejected() {
        let header = Header::new(Opcode::Frame, 1000);
        let err = header.validate(100).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_returns_opcode() {
        let header = Header::new(Opcode::Frame, 10);
        assert_eq!(header.validate(100).unwrap(), Opcode::Frame);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(Opcode::Handshake.to_string(), "HANDSHAKE");
        assert_eq!(Opcode::Pong.to_string(), "PONG");
    }
}
