//! Tracepoint bookkeeping and the enable decision.
//!
//! The session tracks every tracepoint name the tracer announced and whether
//! an enable request has been sent for all of them. Any tracepoint list
//! clears the flag, so the next completed receive cycle re-enables the whole
//! set.

use crate::error::Result;
use crate::protocol::{encode_name_list, Command};
use crate::writer::OutboundFrame;

/// Request to enable a set of tracepoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableRequest {
    /// Names as announced by the tracer (lower-cased when encoded).
    pub names: Vec<String>,
}

impl EnableRequest {
    /// Encode as a TRACEPOINT_ENABLE_REQUEST frame.
    pub fn to_frame(&self) -> Result<OutboundFrame> {
        let body = encode_name_list(&self.names)?;
        OutboundFrame::from_body(Command::TracepointEnableRequest, body.freeze())
    }
}

/// Per-connection tracepoint state.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    tracepoints: Vec<String>,
    all_enabled: bool,
}

impl SessionState {
    /// Fresh state: nothing known, nothing enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record tracepoints from a LIST_REPLY.
    ///
    /// Names are appended as-is (a tracer resending its list produces
    /// duplicates) and the enabled flag is cleared even if `names` is empty.
    pub fn tracepoints_discovered<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.tracepoints.extend(names);
        self.all_enabled = false;
    }

    /// Decide whether the finished receive cycle must enable tracepoints.
    ///
    /// Emits at most one request per discovery: the flag stays set until
    /// the next LIST_REPLY.
    pub fn receive_cycle_completed(&mut self) -> Option<EnableRequest> {
        if self.all_enabled || self.tracepoints.is_empty() {
            return None;
        }

        self.all_enabled = true;
        Some(EnableRequest {
            names: self.tracepoints.clone(),
        })
    }

    /// All tracepoints known so far, in discovery order.
    pub fn tracepoints(&self) -> &[String] {
        &self.tracepoints
    }

    /// Whether an enable request covers the current tracepoint set.
    pub fn all_enabled(&self) -> bool {
        self.all_enabled
    }
}
