use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;
use futures::FutureExt;
use tracing::warn;

use sniff_relay::config::{
    self, DEFAULT_DNS_PORT, DEFAULT_DNS_SERVER, DEFAULT_LOCAL_TCP, DEFAULT_LOCAL_UDP, ProxyConfig,
    ProxyTarget,
};
use sniff_relay::proxy;

#[derive(Parser, Debug)]
#[command(name = "sniff-relay")]
#[command(version, about = "Transparent TCP and DNS relay", long_about = None)]
#[command(after_help = "Example:\n  sniff-relay --local-tcp 9040 --local-dns 9053 \\\n     \
    --http-proxy 192.168.8.100:8080 --dns 8.8.8.8 --show-requests\n\n\
    TCP connections are forwarded to --http-proxy. DNS queries are forwarded\n\
    to --dns. With --show-requests the destination of each is logged.")]
struct Args {
    /// TCP port to listen on locally
    #[arg(short = 't', long, default_value_t = DEFAULT_LOCAL_TCP)]
    local_tcp: u16,

    /// UDP port to listen on locally for DNS
    #[arg(short = 'd', long, default_value_t = DEFAULT_LOCAL_UDP)]
    local_dns: u16,

    /// Remote HTTP proxy (host:port)
    #[arg(short = 'x', long, default_value_t = ProxyTarget::default())]
    http_proxy: ProxyTarget,

    /// Upstream DNS server address
    #[arg(short = 'n', long, default_value_t = DEFAULT_DNS_SERVER)]
    dns: Ipv4Addr,

    /// Upstream DNS server port
    #[arg(long, default_value_t = DEFAULT_DNS_PORT)]
    dns_port: u16,

    /// Log client address and requested domain of each connection and query
    #[arg(short = 's', long)]
    show_requests: bool,

    /// Local address to bind both listeners to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Seconds to wait for the upstream proxy to accept (0 = no limit)
    #[arg(long, default_value_t = 0)]
    connect_timeout: u64,

    /// Maximum lifetime of a relayed TCP session in seconds (0 = no limit)
    #[arg(long, default_value_t = 0)]
    session_timeout: u64,

    /// Seconds a DNS query waits for its reply before being forgotten (0 = no limit)
    #[arg(long, default_value_t = 0)]
    dns_timeout: u64,

    /// Seconds between statistics lines (0 = disabled)
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,

    /// Seconds to let live sessions finish on shutdown
    #[arg(long, default_value_t = 5)]
    shutdown_grace: u64,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            remote_host: self.http_proxy.host,
            remote_port: self.http_proxy.port,
            bind_ip: self.bind,
            local_tcp_port: self.local_tcp,
            local_udp_port: self.local_dns,
            dns_server: self.dns,
            dns_port: self.dns_port,
            show_requests: self.show_requests,
            connect_timeout: config::secs_to_timeout(self.connect_timeout),
            session_timeout: config::secs_to_timeout(self.session_timeout),
            dns_timeout: config::secs_to_timeout(self.dns_timeout),
            stats_interval: config::secs_to_timeout(self.stats_interval),
            shutdown_grace: std::time::Duration::from_secs(self.shutdown_grace),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = args.into_config();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let shutdown = tokio::signal::ctrl_c().map(|result| {
        if let Err(e) = result {
            warn!("Unable to listen for Ctrl-C: {}", e);
        }
    });

    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, proxy::run(config, shutdown))?;

    Ok(())
}
