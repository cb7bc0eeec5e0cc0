//! Transport layer of the relay.
//!
//! Provides the TCP relay towards the upstream HTTP proxy and the UDP
//! forwarder towards the upstream resolver.

pub mod tcp;
pub mod udp;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::timeout;
use tracing::info;

use crate::sniff::SniffResult;

/// Size of the first chunk read from a TCP client (the sniffed segment).
pub const FIRST_CHUNK_SIZE: usize = 8192;

/// Largest UDP payload, so datagrams are never cut short.
pub const MAX_DNS_PACKET_SIZE: usize = 65_535;

/// Port reported when a TCP destination could not be sniffed.
pub const UNKNOWN_DESTINATION_PORT: u16 = 80;

/// Writes one line per sniffed connection or query.
#[derive(Debug, Clone, Copy)]
pub struct RequestLogger {
    enabled: bool,
}

impl RequestLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn dns(&self, client: SocketAddr, domain: &str) {
        if self.enabled {
            info!("{}", dns_line(client, domain));
        }
    }

    pub fn tcp(&self, client: SocketAddr, destination: &SniffResult) {
        if self.enabled {
            info!("{}", tcp_line(client, destination));
        }
    }
}

/// Await `fut`, bounded by `limit` when one is configured.
pub(crate) async fn with_timeout<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> io::Result<F::Output> {
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out")),
        None => Ok(fut.await),
    }
}

fn dns_line(client: SocketAddr, domain: &str) -> String {
    format!(
        "DNS request from {}:{} -> domain: {}",
        client.ip(),
        client.port(),
        domain
    )
}

fn tcp_line(client: SocketAddr, destination: &SniffResult) -> String {
    let port = if destination.port == 0 {
        UNKNOWN_DESTINATION_PORT
    } else {
        destination.port
    };
    format!(
        "TCP: {}:{} -> {}:{}",
        client.ip(),
        client.port(),
        destination.domain,
        port
    )
}
