//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 12 bytes
//! - `WaitingForBody`: Header validated, need N more body bytes
//!
//! Socket reads are not aligned to frame boundaries, so the session feeds
//! every chunk through a `FrameBuffer` and only decodes complete frames.
//!
//! # Example
//!
//! ```
//! use tracy_client::protocol::{build_frame, Command, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_frame(Command::TracePush, b"body").unwrap();
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&bytes[..7]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[7..]).unwrap();
//! assert_eq!(frames[0].body(), b"body");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{peek_body_length, Header, DEFAULT_MAX_BODY_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::ParseFault;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 12 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for body bytes.
    WaitingForBody { header: Header, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Any fault discards everything buffered so far: the tracer stream cannot
/// be resynchronized once framing is lost.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed body size.
    max_body_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max body: 1MB.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a new frame buffer with custom max body size.
    pub fn with_max_body(max_body_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_body_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns the first fault; frames completed before it are lost. Use
    /// [`push_into`](Self::push_into) to keep them.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>, ParseFault> {
        let mut frames = Vec::new();
        self.push_into(data, &mut frames)?;
        Ok(frames)
    }

    /// Push data and append every complete frame to `out`.
    ///
    /// On a fault, frames extracted before it are already in `out` and the
    /// buffer is cleared.
    pub fn push_into(&mut self, data: &[u8], out: &mut Vec<Frame>) -> Result<(), ParseFault> {
        self.buffer.extend_from_slice(data);

        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => out.push(frame),
                Ok(None) => return Ok(()),
                Err(fault) => {
                    self.clear();
                    return Err(fault);
                }
            }
        }
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    fn try_extract_one(&mut self) -> Result<Option<Frame>, ParseFault> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(body_length) = peek_body_length(&self.buffer) else {
                    return Ok(None);
                };

                if body_length > self.max_body_size {
                    return Err(ParseFault::BodyTooLarge {
                        length: body_length,
                        max: self.max_body_size,
                    });
                }

                // Extent comes from the header itself; decode still checks
                // magic and command.
                let frame_len = HEADER_SIZE + body_length as usize;
                let header = Header::decode(&self.buffer[..HEADER_SIZE], frame_len)?;

                let _ = self.buffer.split_to(HEADER_SIZE);

                if body_length == 0 {
                    return Ok(Some(Frame::new(header, Bytes::new())));
                }

                self.state = State::WaitingForBody {
                    header,
                    remaining: body_length,
                };

                self.try_extract_one()
            }

            State::WaitingForBody { header, remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let body = self.buffer.split_to(remaining).freeze();
                let header = *header;

                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(header, body)))
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

    /// Whether a frame has been started but not completed.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForBody { .. })
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
