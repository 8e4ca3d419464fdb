//! Tracer discovery over UDP.
//!
//! A running tracer periodically broadcasts an announcement datagram: the
//! `RuSt` magic followed by a JSON object describing the tracer and the TCP
//! port it accepts clients on.
//!
//! ```text
//! RuSt{"sequence_nr": 3, "server_version": "0.1", "protocoll_version": "1",
//!      "update_interval_msecs": 1000, "hostname": "box", "process_name": "demo",
//!      "port": 61455}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tracy_client::discovery::wait_for_announcement;
//!
//! let (addr, announcement) = wait_for_announcement("0.0.0.0:61000".parse()?, None).await?;
//! println!("{} ({}) at {}", announcement.process_name, announcement.hostname, addr);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;

use crate::error::{Result, TracyError};
use crate::protocol::MAGIC;

/// Largest datagram accepted.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Decoded tracer announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Counter incremented with every announcement.
    pub sequence_nr: u64,
    pub server_version: String,
    #[serde(rename = "protocoll_version")]
    pub protocol_version: String,
    /// Interval between announcements.
    pub update_interval_msecs: u64,
    pub hostname: String,
    pub process_name: String,
    /// TCP port the tracer accepts clients on.
    pub port: u16,
}

impl Announcement {
    /// Parse a datagram: magic, then JSON.
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let json = datagram
            .strip_prefix(&MAGIC[..])
            .ok_or_else(|| TracyError::Discovery("datagram lacks the RuSt magic".into()))?;
        Ok(serde_json::from_slice(json)?)
    }

    /// Encode as a datagram.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut datagram = MAGIC.to_vec();
        serde_json::to_writer(&mut datagram, self)?;
        Ok(datagram)
    }

    /// TCP address of the tracer that sent this announcement from `source`.
    pub fn tracer_addr(&self, source: IpAddr) -> SocketAddr {
        SocketAddr::new(source, self.port)
    }
}

/// Bind a socket for announcements, joining `multicast_group` if given.
pub async fn bind_discovery_socket(
    bind: SocketAddr,
    multicast_group: Option<Ipv4Addr>,
) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(bind).await?;

    if let Some(group) = multicast_group {
        if !group.is_multicast() {
            return Err(TracyError::Discovery(format!(
                "{} is not a multicast address",
                group
            )));
        }
        let interface = match bind.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => {
                return Err(TracyError::Discovery(
                    "IPv4 multicast needs an IPv4 bind address".into(),
                ))
            }
        };
        socket.join_multicast_v4(group, interface)?;
        tracing::debug!("Joined multicast group {}", group);
    }

    tracing::info!("Listening for tracer announcements on {}", socket.local_addr()?);
    Ok(socket)
}

/// Wait for the next valid announcement on `socket`.
///
/// Datagrams that do not parse are skipped. Returns the tracer's TCP address
/// (datagram source IP, announced port) and the announcement.
pub async fn receive_announcement(socket: &UdpSocket) -> Result<(SocketAddr, Announcement)> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (n, source) = socket.recv_from(&mut buf).await?;
        match Announcement::parse(&buf[..n]) {
            Ok(announcement) if announcement.port != 0 => {
                let addr = announcement.tracer_addr(source.ip());
                tracing::info!(
                    "Tracer {} on {} announced at {}",
                    announcement.process_name,
                    announcement.hostname,
                    addr
                );
                return Ok((addr, announcement));
            }
            Ok(_) => tracing::debug!("Ignoring announcement from {} without a port", source),
            Err(e) => tracing::debug!("Ignoring datagram from {}: {}", source, e),
        }
    }
}

/// Bind to `bind` and wait for the first tracer announcement.
pub async fn wait_for_announcement(
    bind: SocketAddr,
    multicast_group: Option<Ipv4Addr>,
) -> Result<(SocketAddr, Announcement)> {
    let socket = bind_discovery_socket(bind, multicast_group).await?;
    receive_announcement(&socket).await
}
