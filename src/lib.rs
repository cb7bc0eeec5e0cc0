//! sniff-relay - a transparent TCP and DNS relay.
//!
//! TCP connections are relayed byte-for-byte to an upstream HTTP proxy and
//! DNS queries to an upstream resolver. Optionally the destination each
//! client asks for is sniffed from the plaintext and logged.

pub mod config;
pub mod error;
pub mod proxy;
pub mod sniff;
pub mod stats;
pub mod transport;
