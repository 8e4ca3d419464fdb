//! Frame struct and outbound frame builders.
//!
//! Represents a complete protocol frame with header and body.
//! Uses `bytes::Bytes` for zero-copy body sharing.
//!
//! # Example
//!
//! ```
//! use tracy_client::protocol::{build_enable_request, Command, Header, HEADER_SIZE};
//!
//! let bytes = build_enable_request(["CPU_Idle"]).unwrap();
//! let header = Header::new(Command::TracepointEnableRequest, 10);
//! assert_eq!(&bytes[..HEADER_SIZE], &header.encode());
//! assert_eq!(&bytes[HEADER_SIZE + 2..], b"cpu_idle");
//! ```

use bytes::{Bytes, BytesMut};

use super::tlv::{encode_tlv_into, tlv_len};
use super::wire_format::{Command, Header, HEADER_SIZE};
use crate::error::{Result, TracyError};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame from header and body.
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the command.
    #[inline]
    pub fn command(&self) -> Command {
        self.header.command
    }

    /// Check if this frame pushes trace events.
    #[inline]
    pub fn is_trace_push(&self) -> bool {
        self.header.command == Command::TracePush
    }

    /// Check if this frame lists tracepoints.
    #[inline]
    pub fn is_tracepoint_list(&self) -> bool {
        self.header.command == Command::TracepointListReply
    }
}

/// Build a complete frame as a single byte vector.
///
/// Fails if the body does not fit the 4-byte length field.
pub fn build_frame(command: Command, body: &[u8]) -> Result<Vec<u8>> {
    let body_length =
        u32::try_from(body.len()).map_err(|_| TracyError::FrameTooLarge(body.len()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&Header::new(command, body_length).encode());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Build a TRACEPOINT_LIST_REQUEST frame (header only).
#[inline]
pub fn build_list_request() -> [u8; HEADER_SIZE] {
    Header::new(Command::TracepointListRequest, 0).encode()
}

/// Encode tracepoint names as consecutive TLVs, lower-cased.
pub fn encode_name_list<I, S>(names: I) -> Result<BytesMut>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = BytesMut::new();
    for name in names {
        let name = name.as_ref().to_lowercase();
        body.reserve(tlv_len(name.len()));
        encode_tlv_into(&mut body, name.as_bytes())?;
    }
    Ok(body)
}

/// Build a TRACEPOINT_ENABLE_REQUEST frame for the given names.
///
/// The body length covers the full TLV encoding of every name.
pub fn build_enable_request<I, S>(names: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let body = encode_name_list(names)?;
    build_frame(Command::TracepointEnableRequest, &body)
}
