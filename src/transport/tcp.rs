//! TCP relay to the upstream HTTP proxy.
//!
//! Each accepted client gets its own task and its own upstream connection.
//! The first chunk from the client is sniffed (when request logging is on)
//! and then written upstream unchanged; after that both directions are
//! copied until either side closes.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::{FIRST_CHUNK_SIZE, RequestLogger, with_timeout};
use crate::config::ProxyConfig;
use crate::error::{RelayError, Result};
use crate::sniff::sniff_connection;
use crate::stats::Stats;

/// TCP side of the relay.
///
/// Binds to a local address and accepts connections from clients.
/// Each connection is handled in a separate task.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind a TCP listener for the transport.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                listener: "TCP",
                addr,
                source,
            })?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start the accept loop.
    ///
    /// The loop stops accepting once `shutdown` flips to `true`; sessions
    /// already running are left to finish on their own.
    pub fn start(
        self,
        config: Arc<ProxyConfig>,
        stats: Arc<Stats>,
        shutdown: watch::Receiver<bool>,
    ) {
        tokio::task::spawn_local(run_accept_loop(self.listener, config, stats, shutdown));
    }
}

/// Accept loop - spawns a session task for each incoming connection.
async fn run_accept_loop(
    listener: TcpListener,
    config: Arc<ProxyConfig>,
    stats: Arc<Stats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = RequestLogger::new(config.show_requests);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((client, client_addr)) => {
                    let config = config.clone();
                    let guard = stats.open_session();
                    let stats = stats.clone();
                    tokio::task::spawn_local(async move {
                        let _guard = guard;
                        if let Err(e) = handle_session(client, client_addr, &config, &stats, logger).await {
                            debug!("TCP session from {} ended with error: {}", client_addr, e);
                            stats.record_failed();
                        }
                    });
                }
                Err(e) => {
                    warn!("TCP accept error: {}", e);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("TCP accept loop stopped");
                    return;
                }
            }
        }
    }
}

/// Relay one client connection through the upstream proxy.
pub async fn handle_session(
    mut client: TcpStream,
    client_addr: SocketAddr,
    config: &ProxyConfig,
    stats: &Stats,
    logger: RequestLogger,
) -> io::Result<()> {
    let mut upstream = connect_upstream(config).await?;

    let mut first = vec![0u8; FIRST_CHUNK_SIZE];
    let n = client.read(&mut first).await?;
    if n == 0 {
        return Ok(());
    }
    let first = &first[..n];

    if logger.enabled() {
        let destination = sniff_connection(first);
        trace!("{} sniffed via {}", client_addr, destination.method.as_str());
        logger.tcp(client_addr, &destination);
    }

    upstream.write_all(first).await?;
    stats.record_relayed(n as u64, 0);

    let mut client = Metered::new(client, stats);
    let copied = with_timeout(
        config.session_timeout,
        tokio::io::copy_bidirectional(&mut client, &mut upstream),
    )
    .await?;
    copied?;

    Ok(())
}

async fn connect_upstream(config: &ProxyConfig) -> io::Result<TcpStream> {
    let connect = TcpStream::connect((config.remote_host.as_str(), config.remote_port));
    let upstream = with_timeout(config.connect_timeout, connect).await??;
    let _ = upstream.set_nodelay(true);
    Ok(upstream)
}

/// Client side of a session that adds bytes to the relay counters as they
/// pass: reads count as up, writes as down.
struct Metered<'a, S> {
    inner: S,
    stats: &'a Stats,
}

impl<'a, S> Metered<'a, S> {
    fn new(inner: S, stats: &'a Stats) -> Self {
        Self { inner, stats }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Metered<'_, S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.stats
                .record_relayed((buf.filled().len() - before) as u64, 0);
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Metered<'_, S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.stats.record_relayed(0, *n as u64);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
