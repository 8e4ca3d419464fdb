//! Wire format encoding and decoding.
//!
//! Implements the 12-byte header format:
//! ```text
//! ┌──────────┬─────────┬──────────┬─────────────┐
//! │ Magic    │ Flags   │ Command  │ Body length │
//! │ "RuSt"   │ 2 bytes │ uint16 BE│ uint32 BE   │
//! └──────────┴─────────┴──────────┴─────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::ParseFault;

/// Header size in bytes (fixed, exactly 12).
pub const HEADER_SIZE: usize = 12;

/// Magic number opening every frame.
pub const MAGIC: [u8; 4] = *b"RuSt";

/// Size of the fixed timestamp field in a trace event.
pub const TIMESTAMP_SIZE: usize = 8;

/// Size of a TLV length prefix.
pub const TLV_LENGTH_SIZE: usize = 2;

/// Largest value a TLV can carry.
pub const MAX_TLV_LEN: usize = u16::MAX as usize;

/// Longest tracepoint name the tracer accepts.
pub const MAX_TRACEPOINT_NAME_LEN: usize = 32;

/// Default maximum frame body accepted from the tracer (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u32 = 1024 * 1024;

/// First TCP port the tracer tries to bind.
pub const DEFAULT_TRACER_PORT: u16 = 61455;

/// Protocol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    TracepointListRequest = 1,
    TracepointListReply = 2,
    TracepointEnableRequest = 3,
    TracepointDisableRequest = 4,
    TracePush = 5,
}

impl Command {
    /// Map a wire code to a command.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::TracepointListRequest),
            2 => Some(Self::TracepointListReply),
            3 => Some(Self::TracepointEnableRequest),
            4 => Some(Self::TracepointDisableRequest),
            5 => Some(Self::TracePush),
            _ => None,
        }
    }

    /// Wire code of this command.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether a client may legally receive this command.
    #[inline]
    pub fn is_inbound(self) -> bool {
        matches!(self, Self::TracepointListReply | Self::TracePush)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Reserved flags (always 0 on send, ignored on receive).
    pub flags: u16,
    /// Frame command.
    pub command: Command,
    /// Body length in bytes (excluding the header).
    pub body_length: u32,
}

impl Header {
    /// Create a new header with zero flags.
    pub fn new(command: Command, body_length: u32) -> Self {
        Self {
            flags: 0,
            command,
            body_length,
        }
    }

    /// Total frame length (header + body).
    #[inline]
    pub fn frame_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.body_length as u64
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use tracy_client::protocol::{Command, Header};
    ///
    /// let bytes = Header::new(Command::TracepointListRequest, 0).encode();
    /// assert_eq!(&bytes[..4], b"RuSt");
    /// assert_eq!(bytes.len(), 12);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (12 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&self.flags.to_be_bytes());
        buf[6..8].copy_from_slice(&self.command.code().to_be_bytes());
        buf[8..12].copy_from_slice(&self.body_length.to_be_bytes());
    }

    /// Decode and validate a header received from the tracer.
    ///
    /// `total_available` is the number of bytes belonging to this frame,
    /// header included. Checks, in order: magic number, that
    /// `total_available == body_length + 12`, and that the command is one
    /// the client can receive.
    ///
    /// # Example
    ///
    /// ```
    /// use tracy_client::protocol::{Command, Header};
    ///
    /// let bytes = Header::new(Command::TracePush, 20).encode();
    /// let header = Header::decode(&bytes, 32).unwrap();
    /// assert_eq!(header.command, Command::TracePush);
    /// assert!(Header::decode(&bytes, 31).is_err());
    /// ```
    pub fn decode(buf: &[u8], total_available: usize) -> Result<Self, ParseFault> {
        if buf.len() < HEADER_SIZE {
            return Err(ParseFault::TruncatedBuffer {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }

        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != MAGIC {
            return Err(ParseFault::InvalidMagic(magic));
        }

        let flags = u16::from_be_bytes([buf[4], buf[5]]);
        let code = u16::from_be_bytes([buf[6], buf[7]]);
        let body_length = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let expected = HEADER_SIZE as u64 + body_length as u64;
        if total_available as u64 != expected {
            return Err(ParseFault::LengthMismatch {
                expected,
                actual: total_available,
            });
        }

        let command = Command::from_code(code)
            .filter(|c| c.is_inbound())
            .ok_or(ParseFault::UnsupportedCommand(code))?;

        Ok(Self {
            flags,
            command,
            body_length,
        })
    }
}

/// Read the body length a header announces, without validating anything else.
///
/// Returns `None` if fewer than 12 bytes are available.
#[inline]
pub fn peek_body_length(buf: &[u8]) -> Option<u32> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]))
}

/// Encode a header to bytes (standalone function).
#[inline]
pub fn encode_header(command: Command, body_length: u32) -> [u8; HEADER_SIZE] {
    Header::new(command, body_length).encode()
}

/// Decode and validate a header (standalone function).
#[inline]
pub fn decode_header(buf: &[u8], total_available: usize) -> Result<Header, ParseFault> {
    Header::decode(buf, total_available)
}
