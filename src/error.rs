//! Relay error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid proxy address `{0}`, expected host:port")]
    InvalidProxyAddress(String),

    #[error("{listener} bind on {addr} failed: {source}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
