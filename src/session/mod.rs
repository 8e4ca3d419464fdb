//! Session module - tracepoint state machine and connection driver.
//!
//! Provides:
//! - [`SessionState`] - known tracepoints and the enable decision
//! - [`ProtocolSession`] - sans-I/O driver for one tracer connection
//! - [`TraceSink`] - where decoded trace events are delivered

mod engine;
mod sink;
mod state;

pub use engine::ProtocolSession;
pub use sink::TraceSink;
pub use state::{EnableRequest, SessionState};
