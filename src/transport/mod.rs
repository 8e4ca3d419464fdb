//! Transport module - connection to the tracer.
//!
//! The tracer listens on TCP; see [`connect`].

mod tcp;

pub use tcp::{connect, TracerConnection};
