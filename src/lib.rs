//! # tracy-client
//!
//! Client for the tracy tracer protocol.
//!
//! A tracer is a daemon that collects trace events from instrumented
//! processes. This crate connects to it over TCP, learns which tracepoints
//! exist, enables all of them and delivers the pushed trace events.
//!
//! ## Architecture
//!
//! - **Protocol** (`protocol`): 12-byte header, TLV fields, frame reassembly
//!   and message decoding. Pure, no I/O.
//! - **Session** (`session`): tracepoint state machine and event delivery
//!   for one connection. Pure, no I/O.
//! - **Runtime** (`Client`): socket reader loop plus a writer task.
//! - **Discovery** (`discovery`): UDP announcements sent by the tracer.
//!
//! ## Example
//!
//! ```ignore
//! use tracy_client::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tracy_client::TracyError> {
//!     let (client, mut events) = ClientBuilder::new()
//!         .host("localhost")
//!         .connect_channel()
//!         .await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{} @ {}ns", event.tracepoint_name(), event.timestamp_ns);
//!     }
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

mod client;
mod writer;

pub use client::{Client, ClientBuilder, DEFAULT_HOST, DEFAULT_READ_BUFFER_SIZE};
pub use discovery::{wait_for_announcement, Announcement};
pub use error::{ParseFault, Result, TracyError};
pub use protocol::{DecodedMessage, TraceEvent};
pub use session::{ProtocolSession, TraceSink};
pub use writer::OutboundFrame;
