//! Protocol session - drives one connection without doing any I/O.
//!
//! The transport hands every received chunk to
//! [`ProtocolSession::on_bytes_received`] and writes back whatever frame it
//! returns. Chunks may split or merge frames arbitrarily; the session
//! reassembles them before decoding.
//!
//! # Example
//!
//! ```
//! use tracy_client::protocol::{build_frame, encode_tlv, Command, TraceEvent};
//! use tracy_client::session::ProtocolSession;
//!
//! let mut session = ProtocolSession::new(Vec::<TraceEvent>::new());
//! let hello = session.on_connected();
//! assert_eq!(hello.to_vec().len(), 12);
//!
//! let reply = build_frame(Command::TracepointListReply, &encode_tlv(b"cpu_idle").unwrap()).unwrap();
//! let enable = session.on_bytes_received(&reply).unwrap();
//! assert!(enable.is_some());
//! ```

use crate::error::Result;
use crate::protocol::{decode_body, DecodedMessage, FrameBuffer, DEFAULT_MAX_BODY_SIZE};
use crate::writer::OutboundFrame;

use super::sink::TraceSink;
use super::state::SessionState;

/// One tracer connection: reassembly, tracepoint state and event sink.
#[derive(Debug)]
pub struct ProtocolSession<S> {
    state: SessionState,
    frames: FrameBuffer,
    sink: S,
}

impl<S: TraceSink> ProtocolSession<S> {
    /// Create a session delivering events to `sink`.
    pub fn new(sink: S) -> Self {
        Self::with_max_body(sink, DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a session that rejects frame bodies above `max_body_size`.
    pub fn with_max_body(sink: S, max_body_size: u32) -> Self {
        Self {
            state: SessionState::new(),
            frames: FrameBuffer::with_max_body(max_body_size),
            sink,
        }
    }

    /// Connection established: returns the TRACEPOINT_LIST_REQUEST to send.
    pub fn on_connected(&mut self) -> OutboundFrame {
        self.frames.clear();
        tracing::debug!("Requesting tracepoint list");
        OutboundFrame::list_request()
    }

    /// Process one received chunk.
    ///
    /// Decoded events go to the sink in arrival order. Returns the enable
    /// request to send, if this cycle discovered tracepoints that are not
    /// yet enabled.
    ///
    /// Parse faults are logged, not returned: everything decoded before the
    /// fault is delivered and the rest of the chunk is dropped.
    ///
    /// # Errors
    ///
    /// Fails only if the enable request cannot be encoded.
    pub fn on_bytes_received(&mut self, data: &[u8]) -> Result<Option<OutboundFrame>> {
        let mut frames = Vec::new();
        if let Err(fault) = self.frames.push_into(data, &mut frames) {
            tracing::warn!("Discarding receive buffer: {}", fault);
        }

        let mut messages = Vec::new();
        for frame in &frames {
            if let Err(fault) = decode_body(&frame.header, &frame.body, &mut messages) {
                tracing::warn!("Discarding rest of receive cycle: {}", fault);
                self.frames.clear();
                break;
            }
        }

        for message in messages {
            self.dispatch(message);
        }

        match self.state.receive_cycle_completed() {
            Some(request) => {
                tracing::debug!("Enabling {} tracepoints", request.names.len());
                request.to_frame().map(Some)
            }
            None => Ok(None),
        }
    }

    /// Connection ended: notifies the sink and hands it back.
    pub fn on_disconnected(mut self) -> S {
        if self.frames.has_partial_frame() {
            tracing::debug!("Dropping {} bytes of incomplete frame", self.frames.len());
        }
        self.sink.on_connection_lost();
        self.sink
    }

    /// Tracepoint state of this session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The event sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn dispatch(&mut self, message: DecodedMessage) {
        match message {
            DecodedMessage::TracepointsDiscovered(names) => {
                tracing::debug!("Tracer announced {} tracepoints", names.len());
                self.sink.on_tracepoints_discovered(&names);
                self.state.tracepoints_discovered(names);
            }
            DecodedMessage::TraceEvent(event) => self.sink.on_trace_event(event),
        }
    }
}
