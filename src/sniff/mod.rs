//! Destination sniffing over the first bytes of a flow.
//!
//! The sniffers only ever borrow the buffer they inspect. Whatever they
//! return, the relay forwards the same bytes it received.

pub mod cursor;
pub mod dns;
pub mod http;
pub mod tls;

use std::fmt;

use tracing::trace;

/// Longest domain copied out of a packet; longer names are truncated.
pub const MAX_DOMAIN_LEN: usize = 255;

/// Placeholder domain when nothing could be sniffed.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// How a destination was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffMethod {
    DnsQuestion,
    HttpConnect,
    HttpHostHeader,
    TlsSni,
    None,
}

impl SniffMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SniffMethod::DnsQuestion => "dns",
            SniffMethod::HttpConnect => "http-connect",
            SniffMethod::HttpHostHeader => "http-host",
            SniffMethod::TlsSni => "tls-sni",
            SniffMethod::None => "none",
        }
    }
}

/// Best-effort destination of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffResult {
    pub domain: String,
    pub port: u16,
    pub method: SniffMethod,
}

impl SniffResult {
    pub fn new(domain: impl Into<String>, port: u16, method: SniffMethod) -> Self {
        Self {
            domain: domain.into(),
            port,
            method,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_DOMAIN, 0, SniffMethod::None)
    }

    pub fn is_unknown(&self) -> bool {
        self.method == SniffMethod::None
    }
}

impl fmt::Display for SniffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.port)
    }
}

/// Sniff the first segment of a TCP connection.
///
/// Tries an HTTP request line / Host header first, then a TLS ClientHello.
/// Anything spread over more than this one buffer is not recovered.
pub fn sniff_connection(first: &[u8]) -> SniffResult {
    if let Some(result) = http::sniff(first) {
        return result;
    }

    match tls::sniff(first, MAX_DOMAIN_LEN) {
        Ok(result) => result,
        Err(e) => {
            trace!("no SNI in first segment: {}", e);
            SniffResult::unknown()
        }
    }
}

/// Copy at most `capacity` bytes of `name` into a string.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, since
/// the value is only ever displayed.
pub(crate) fn bounded_name(name: &[u8], capacity: usize) -> String {
    let name = &name[..name.len().min(capacity)];
    String::from_utf8_lossy(name).into_owned()
}

#[cfg(test)]
pub(crate) mod testutil {
    /// Build a DNS query packet for `domain`.
    pub fn dns_query(id: u16, domain: &str) -> Vec<u8> {
        let mut packet = Vec::with_capacity(512);
        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
        packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
        packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        for label in domain.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0x00);
        packet.extend_from_slice(&[0x00, 0x01]); // Type: A
        packet.extend_from_slice(&[0x00, 0x01]); // Class: IN
        packet
    }

    /// Offsets of every length field in a ClientHello built by [`client_hello`].
    pub struct HelloLayout {
        pub bytes: Vec<u8>,
        pub length_fields: Vec<(usize, usize)>,
    }

    /// Build a TLS 1.2 ClientHello record carrying `sni` (if any).
    ///
    /// A couple of unrelated extensions are placed around the server_name
    /// extension so the scan has to skip them.
    pub fn client_hello(sni: Option<&str>) -> HelloLayout {
        let mut fields = Vec::new();

        let mut body = Vec::new();
        body.extend_from_slice(&[0x03, 0x03]); // client_version
        body.extend_from_slice(&[0x5a; 32]); // random
        fields.push((body.len(), 1));
        body.push(32); // session id
        body.extend_from_slice(&[0x11; 32]);
        fields.push((body.len(), 2));
        body.extend_from_slice(&[0x00, 0x04, 0x13, 0x01, 0xc0, 0x2f]);
        fields.push((body.len(), 1));
        body.extend_from_slice(&[0x01, 0x00]);

        let mut exts = Vec::new();
        // supported_groups
        exts.extend_from_slice(&[0x00, 0x0a, 0x00, 0x04, 0x00, 0x02, 0x00, 0x1d]);
        if let Some(name) = sni {
            let mut ext_fields = Vec::new();
            let name = name.as_bytes();
            let mut ext = Vec::new();
            ext.extend_from_slice(&[0x00, 0x00]);
            ext_fields.push((ext.len(), 2));
            ext.extend_from_slice(&((name.len() + 5) as u16).to_be_bytes());
            ext_fields.push((ext.len(), 2));
            ext.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
            ext.push(0x00);
            ext_fields.push((ext.len(), 2));
            ext.extend_from_slice(&(name.len() as u16).to_be_bytes());
            ext.extend_from_slice(name);
            for (offset, width) in ext_fields {
                // +2 for the extensions block length placed before `exts`
                fields.push((body.len() + 2 + exts.len() + offset, width));
            }
            exts.extend_from_slice(&ext);
        }
        // ec_point_formats
        exts.extend_from_slice(&[0x00, 0x0b, 0x00, 0x02, 0x01, 0x00]);

        fields.push((body.len(), 2));
        body.extend_from_slice(&(exts.len() as u16).to_be_bytes());
        body.extend_from_slice(&exts);

        let mut handshake = vec![0x01];
        handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        handshake.extend_from_slice(&body);

        let mut record = vec![0x16, 0x03, 0x01];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        // record header (5) + handshake header (4) precede `body`
        let mut length_fields: Vec<(usize, usize)> =
            fields.into_iter().map(|(o, w)| (o + 9, w)).collect();
        length_fields.push((3, 2));
        length_fields.push((6, 3));

        HelloLayout {
            bytes: record,
            length_fields,
        }
    }
}
