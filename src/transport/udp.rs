//! UDP forwarder for DNS queries.
//!
//! Every query is relayed from its own ephemeral socket connected to the
//! resolver, so the reply is tied to the client by address alone and
//! several queries can be in flight at once. Datagrams are forwarded
//! whether or not they parse.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, warn};

use super::{MAX_DNS_PACKET_SIZE, RequestLogger, with_timeout};
use crate::config::ProxyConfig;
use crate::error::{RelayError, Result};
use crate::sniff::dns;
use crate::stats::Stats;

/// Local address of the per-query upstream sockets. The resolver is IPv4.
const UPSTREAM_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

/// Queries relayed at once; further queries wait for a slot.
const MAX_IN_FLIGHT_QUERIES: usize = 1024;

/// UDP side of the relay.
///
/// Binds to a local address and forwards queries to an upstream resolver.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket for the transport.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                listener: "UDP",
                addr,
                source,
            })?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP forwarder.
    ///
    /// Spawns the receive loop; each query then gets a task of its own.
    pub fn start(
        self,
        config: Arc<ProxyConfig>,
        stats: Arc<Stats>,
        shutdown: watch::Receiver<bool>,
    ) {
        tokio::task::spawn_local(run(self.socket, config, stats, shutdown));
    }
}

/// Whether a query from `src` gets a log line. Traffic from the resolver
/// itself is never logged.
fn should_log(config: &ProxyConfig, src: SocketAddr) -> bool {
    config.show_requests && !config.is_dns_server(src.ip())
}

/// Receive loop for the UDP forwarder.
async fn run(
    socket: Arc<UdpSocket>,
    config: Arc<ProxyConfig>,
    stats: Arc<Stats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = RequestLogger::new(config.show_requests);
    let in_flight = Arc::new(Semaphore::new(MAX_IN_FLIGHT_QUERIES));
    let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, src) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("UDP recv error: {}", e);
                        continue;
                    }
                };
                let query = buf[..len].to_vec();

                if should_log(&config, src) {
                    logger.dns(src, &dns::sniff(&query).domain);
                }

                let Ok(permit) = in_flight.clone().acquire_owned().await else {
                    return;
                };
                let socket = socket.clone();
                let config = config.clone();
                let stats = stats.clone();
                let mut stop = shutdown.clone();
                tokio::task::spawn_local(async move {
                    let _permit = permit;
                    tokio::select! {
                        result = forward_query(&socket, &query, src, &config, &stats) => {
                            if let Err(e) = result {
                                debug!("DNS query from {} not answered: {}", src, e);
                            }
                        }
                        _ = stop.wait_for(|&stopped| stopped) => {}
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("UDP forwarder stopped");
                    return;
                }
            }
        }
    }
}

/// Relay one query through a fresh socket and hand the resolver's reply
/// back to `client`.
async fn forward_query(
    socket: &UdpSocket,
    query: &[u8],
    client: SocketAddr,
    config: &ProxyConfig,
    stats: &Stats,
) -> io::Result<()> {
    let upstream = UdpSocket::bind(UPSTREAM_BIND).await?;
    upstream.connect(config.dns_upstream_addr()).await?;
    upstream.send(query).await?;
    stats.record_dns_forwarded();

    let mut reply = vec![0u8; MAX_DNS_PACKET_SIZE];
    let len = with_timeout(config.dns_timeout, upstream.recv(&mut reply)).await??;

    socket.send_to(&reply[..len], client).await?;
    stats.record_dns_answered();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging_config() -> ProxyConfig {
        ProxyConfig {
            show_requests: true,
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn logs_queries_from_clients() {
        let config = logging_config();

        assert!(should_log(&config, "192.168.1.20:40000".parse().unwrap()));
        assert!(should_log(&config, "[::1]:40000".parse().unwrap()));
    }

    #[test]
    fn suppresses_queries_from_resolver() {
        let config = logging_config();

        assert!(!should_log(&config, "8.8.8.8:53".parse().unwrap()));
        assert!(!should_log(&config, "8.8.8.8:40000".parse().unwrap()));
        assert!(!should_log(&config, "[::ffff:8.8.8.8]:53".parse().unwrap()));
    }

    #[test]
    fn nothing_logged_when_disabled() {
        let config = ProxyConfig::default();

        assert!(!should_log(&config, "192.168.1.20:40000".parse().unwrap()));
    }
}
