//! Dedicated writer task for outbound frames.
//!
//! The reader loop never writes to the socket itself. Outbound frames go
//! through an mpsc channel to a single writer task, which batches whatever is
//! queued into one vectored write.
//!
//! # Architecture
//!
//! ```text
//! Reader loop ─┐
//! Client API  ─┴─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! ```
//!
//! Writes are fire-and-forget: the tracer never acknowledges requests.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, TracyError};
use crate::protocol::{Command, Header, HEADER_SIZE};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Pre-encoded header (12 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Body bytes (empty for a list request).
    pub body: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    ///
    /// The header's body length must match `body`.
    #[inline]
    pub fn new(header: &Header, body: Bytes) -> Self {
        debug_assert_eq!(header.body_length as usize, body.len());
        Self {
            header: header.encode(),
            body,
        }
    }

    /// Create a frame for `command`, deriving the header from the body.
    pub fn from_body(command: Command, body: Bytes) -> Result<Self> {
        let body_length =
            u32::try_from(body.len()).map_err(|_| TracyError::FrameTooLarge(body.len()))?;
        Ok(Self::new(&Header::new(command, body_length), body))
    }

    /// Create a new outbound frame with empty body.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self {
            header: header.encode(),
            body: Bytes::new(),
        }
    }

    /// TRACEPOINT_LIST_REQUEST frame.
    pub fn list_request() -> Self {
        Self::empty(&Header::new(Command::TracepointListRequest, 0))
    }

    /// Total size of this frame (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Contiguous copy of the frame.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable. The writer task ends once every handle is dropped.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting for channel space.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TracyError::ConnectionClosed)
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// # Arguments
///
/// * `writer` - The async writer (socket write half)
/// * `config` - Writer configuration
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)` where the JoinHandle can be used
/// to wait for the writer task to complete.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Writing to tracer failed: {}", e);
            return Err(e);
        }
        tracing::trace!("Wrote {} frames", batch.len());
        batch.clear();
    }

    // All handles dropped, clean shutdown
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(TracyError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut position = 0;

    for frame in batch {
        for part in [&frame.header[..], &frame.body[..]] {
            let end = position + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(position);
                slices.push(IoSlice::new(&part[start..]));
            }
            position = end;
        }
    }

    slices
}
