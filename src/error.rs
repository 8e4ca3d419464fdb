//! Error types for tracy-client.

use thiserror::Error;

/// Fault found while decoding bytes received from the tracer.
///
/// Faults are local to one receive cycle: parsing stops at the fault and
/// everything decoded before it is still delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFault {
    /// Header does not start with the `RuSt` magic number.
    #[error("Invalid magic number: {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// Announced body length does not match the bytes available for the frame.
    #[error("Length mismatch: header announces {expected} bytes, {actual} available")]
    LengthMismatch { expected: u64, actual: usize },

    /// Command the client is not allowed to receive.
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u16),

    /// Field runs past the end of the buffer.
    #[error("Truncated buffer: need {needed} bytes, {available} available")]
    TruncatedBuffer { needed: usize, available: usize },

    /// Announced body exceeds the configured maximum.
    #[error("Body size {length} exceeds maximum {max}")]
    BodyTooLarge { length: u32, max: u32 },
}

/// Main error type for all tracy-client operations.
#[derive(Debug, Error)]
pub enum TracyError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while decoding a discovery announcement.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed data received from the tracer.
    #[error("Protocol error: {0}")]
    Parse(#[from] ParseFault),

    /// Value does not fit the 2-byte TLV length field.
    #[error("TLV value of {0} bytes exceeds the 65535 byte limit")]
    TlvTooLong(usize),

    /// Frame body does not fit the 4-byte length field.
    #[error("Frame body of {0} bytes exceeds the u32 length field")]
    FrameTooLarge(usize),

    /// Tracer discovery failed.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Background task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using TracyError.
pub type Result<T> = std::result::Result<T, TracyError>;
