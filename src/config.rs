//! Relay configuration.
//!
//! Built once at startup and shared read-only by every task.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::RelayError;

pub const DEFAULT_LOCAL_TCP: u16 = 9040;
pub const DEFAULT_LOCAL_UDP: u16 = 9053;
pub const DEFAULT_PROXY_HOST: &str = "192.168.8.100";
pub const DEFAULT_PROXY_PORT: u16 = 8080;
pub const DEFAULT_DNS_SERVER: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Upstream HTTP proxy address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
}

impl Default for ProxyTarget {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROXY_HOST.to_string(),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl std::str::FromStr for ProxyTarget {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RelayError::InvalidProxyAddress(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream HTTP proxy every TCP connection is relayed to.
    pub remote_host: String,
    pub remote_port: u16,
    /// Local address both listeners bind to.
    pub bind_ip: IpAddr,
    pub local_tcp_port: u16,
    pub local_udp_port: u16,
    /// Upstream DNS resolver.
    pub dns_server: Ipv4Addr,
    pub dns_port: u16,
    /// Log the sniffed destination of every connection and query.
    pub show_requests: bool,
    pub connect_timeout: Option<Duration>,
    /// Upper bound on the lifetime of one relayed TCP session.
    pub session_timeout: Option<Duration>,
    pub dns_timeout: Option<Duration>,
    pub stats_interval: Option<Duration>,
    pub shutdown_grace: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            remote_host: DEFAULT_PROXY_HOST.to_string(),
            remote_port: DEFAULT_PROXY_PORT,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_tcp_port: DEFAULT_LOCAL_TCP,
            local_udp_port: DEFAULT_LOCAL_UDP,
            dns_server: DEFAULT_DNS_SERVER,
            dns_port: DEFAULT_DNS_PORT,
            show_requests: false,
            connect_timeout: None,
            session_timeout: None,
            dns_timeout: None,
            stats_interval: Some(Duration::from_secs(60)),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ProxyConfig {
    pub fn tcp_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.local_tcp_port)
    }

    pub fn udp_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.local_udp_port)
    }

    pub fn dns_upstream_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.dns_server), self.dns_port)
    }

    /// Whether `ip` is the configured resolver.
    pub fn is_dns_server(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4 == self.dns_server,
            IpAddr::V6(v6) => v6.to_ipv4_mapped() == Some(self.dns_server),
        }
    }
}

/// Convert a seconds count into a timeout, with 0 meaning none.
pub fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
