//! Client builder and runtime loop.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the
//! connection and building the client. The [`Client`] manages the lifecycle:
//! 1. Connect to the tracer over TCP
//! 2. Send TRACEPOINT_LIST_REQUEST
//! 3. Read chunks and feed them to the protocol session
//! 4. Send enable requests the session produces
//!
//! # Example
//!
//! ```ignore
//! use tracy_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, mut events) = Client::builder()
//!         .host("localhost")
//!         .port(61455)
//!         .connect_channel()
//!         .await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{}: {:?}", event.tracepoint_name(), event.payload);
//!     }
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::protocol::{TraceEvent, DEFAULT_MAX_BODY_SIZE, DEFAULT_TRACER_PORT};
use crate::session::{ProtocolSession, TraceSink};
use crate::transport::{connect, TracerConnection};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Default tracer host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default socket read buffer size (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and creating a tracer client.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: String,
    port: u16,
    read_buffer_size: usize,
    max_body_size: u32,
    writer_config: WriterConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_TRACER_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            writer_config: WriterConfig::default(),
        }
    }

    /// Set the tracer host name or address.
    ///
    /// Default: `localhost`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the tracer TCP port.
    ///
    /// Default: 61455
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set host and port from a socket address.
    pub fn address(self, addr: SocketAddr) -> Self {
        self.host(addr.ip().to_string()).port(addr.port())
    }

    /// Set the size of each socket read.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the largest frame body accepted from the tracer.
    ///
    /// Default: 1 MiB
    pub fn max_body_size(mut self, size: u32) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 64
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Connect and deliver events to `sink`.
    pub async fn connect<S>(self, sink: S) -> Result<Client<S>>
    where
        S: TraceSink + 'static,
    {
        let connection = connect(&self.host, self.port).await?;
        self.start(connection, sink).await
    }

    /// Connect and deliver events through a channel.
    pub async fn connect_channel(
        self,
    ) -> Result<(
        Client<mpsc::UnboundedSender<TraceEvent>>,
        mpsc::UnboundedReceiver<TraceEvent>,
    )> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.connect(tx).await?;
        Ok((client, rx))
    }

    /// Run the client over an already established connection.
    pub async fn start<S>(self, connection: TracerConnection, sink: S) -> Result<Client<S>>
    where
        S: TraceSink + 'static,
    {
        let peer = connection.peer_addr();
        let (reader, write_half) = connection.into_split();

        let (writer, writer_task) = spawn_writer_task(write_half, self.writer_config);

        let mut session = ProtocolSession::with_max_body(sink, self.max_body_size);
        writer.send(session.on_connected()).await?;

        let read_task = tokio::spawn(read_loop(
            reader,
            session,
            writer.clone(),
            self.read_buffer_size,
        ));

        Ok(Client {
            peer,
            writer,
            read_task,
            _writer_task: writer_task,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running tracer client.
///
/// Use `wait_for_shutdown()` to block until the tracer closes the connection.
pub struct Client<S = Box<dyn TraceSink>> {
    peer: SocketAddr,
    writer: WriterHandle,
    read_task: JoinHandle<Result<S>>,
    _writer_task: JoinHandle<Result<()>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<S> Client<S> {
    /// Address of the tracer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the connection is still open for writing.
    pub fn is_connected(&self) -> bool {
        !self.writer.is_closed()
    }

    /// Ask the tracer for its tracepoint list again.
    ///
    /// Tracepoints registered since the last reply are enabled once the
    /// reply arrives.
    pub async fn request_tracepoints(&self) -> Result<()> {
        self.writer.send(OutboundFrame::list_request()).await
    }

    /// Wait until the tracer closes the connection.
    ///
    /// Returns the sink after it was notified of the connection loss.
    pub async fn wait_for_shutdown(self) -> Result<S> {
        self.read_task.await?
    }
}

/// Main read loop - feeds socket chunks to the session until EOF.
async fn read_loop<R, S>(
    mut reader: R,
    mut session: ProtocolSession<S>,
    writer: WriterHandle,
    read_buffer_size: usize,
) -> Result<S>
where
    R: AsyncRead + Unpin,
    S: TraceSink,
{
    let result = pump(&mut reader, &mut session, &writer, read_buffer_size).await;
    if let Err(e) = &result {
        tracing::error!("Read loop error: {}", e);
    }
    let sink = session.on_disconnected();
    result.map(|()| sink)
}

async fn pump<R, S>(
    reader: &mut R,
    session: &mut ProtocolSession<S>,
    writer: &WriterHandle,
    read_buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: TraceSink,
{
    let mut buf = vec![0u8; read_buffer_size];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::info!("The tracer closed the connection");
            return Ok(());
        }

        if let Some(frame) = session.on_bytes_received(&buf[..n])? {
            writer.send(frame).await?;
        }
    }
}
