//! Relay orchestration.
//!
//! Binds both transports, runs them until shutdown and drains live TCP
//! sessions before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::stats::{Stats, StatsSnapshot};
use crate::transport::{tcp::TcpTransport, udp::UdpTransport};

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the relay with the given configuration until `shutdown` resolves.
///
/// Must be called from within a `LocalSet`. Bind failures are returned
/// before anything is spawned.
pub async fn run(config: ProxyConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
    let config = Arc::new(config);
    let stats = Arc::new(Stats::new());

    let tcp = TcpTransport::bind(config.tcp_bind_addr()).await?;
    let udp = UdpTransport::bind(config.udp_bind_addr()).await?;

    info!(
        "Starting local TCP proxy on {} -> {}:{}",
        tcp.local_addr()?,
        config.remote_host,
        config.remote_port
    );
    info!(
        "Starting local DNS proxy on {} -> DNS server {}",
        udp.local_addr()?,
        config.dns_upstream_addr()
    );
    if config.show_requests {
        info!("Request logging is enabled.");
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    udp.start(config.clone(), stats.clone(), stop_rx.clone());
    tcp.start(config.clone(), stats.clone(), stop_rx.clone());

    if let Some(interval) = config.stats_interval {
        let stats = stats.clone();
        let mut stop = stop_rx;
        tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => log_stats(&stats.snapshot()),
                    _ = stop.changed() => return,
                }
            }
        });
    }

    shutdown.await;
    info!("Shutting down, no longer accepting connections");
    let _ = stop_tx.send(true);

    drain(&stats, config.shutdown_grace).await;
    log_stats(&stats.snapshot());

    Ok(())
}

/// Wait for live sessions to finish, up to `grace`.
async fn drain(stats: &Stats, grace: Duration) {
    let deadline = Instant::now() + grace;

    while stats.active_sessions() > 0 {
        if Instant::now() >= deadline {
            warn!(
                "{} session(s) still active after {:?}, closing",
                stats.active_sessions(),
                grace
            );
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

fn log_stats(stats: &StatsSnapshot) {
    info!(
        "[stats] uptime={}s sessions={} active={} failed={} up={}B down={}B dns_forwarded={} dns_answered={}",
        stats.uptime_secs,
        stats.sessions_total,
        stats.sessions_active,
        stats.sessions_failed,
        stats.bytes_up,
        stats.bytes_down,
        stats.dns_forwarded,
        stats.dns_answered
    );
}
