//! TCP connection to the tracer.
//!
//! # Example
//!
//! ```ignore
//! use tracy_client::transport::connect;
//!
//! let connection = connect("localhost", 61455).await?;
//! let (reader, writer) = connection.into_split();
//! ```

use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::Result;

/// Connected TCP stream to a tracer.
#[derive(Debug)]
pub struct TracerConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Open a TCP connection to the tracer at `host:port`.
///
/// `host` may be a name or an address; every resolved address is tried in
/// order.
pub async fn connect(host: &str, port: u16) -> Result<TracerConnection> {
    let stream = TcpStream::connect((host, port)).await?;
    TracerConnection::from_stream(stream)
}

impl TracerConnection {
    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        tracing::info!("Connected to tracer at {}", peer);
        Ok(Self { stream, peer })
    }

    /// Address of the tracer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Split into read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &TcpStream {
        &self.stream
    }
}
