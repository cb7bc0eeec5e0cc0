//! Target extraction from plaintext HTTP proxy requests.
//!
//! Recognizes a `CONNECT host:port` request line, or failing that a `Host:`
//! header. Nothing here assumes the buffer is terminated or complete.

use super::{MAX_DOMAIN_LEN, SniffMethod, SniffResult, bounded_name};

const CONNECT_PREFIX: &[u8] = b"CONNECT ";
const HOST_HEADER: &[u8] = b"host:";

const CONNECT_DEFAULT_PORT: u16 = 443;
const HTTP_DEFAULT_PORT: u16 = 80;

/// Sniff the request target, if the buffer looks like an HTTP request.
pub fn sniff(buf: &[u8]) -> Option<SniffResult> {
    if let Some(target) = buf.strip_prefix(CONNECT_PREFIX) {
        let end = target
            .iter()
            .position(|&b| matches!(b, b' ' | b'\r' | b'\n'))
            .unwrap_or(target.len());
        if let Some((host, port)) = split_host_port(&target[..end], CONNECT_DEFAULT_PORT) {
            return Some(SniffResult::new(host, port, SniffMethod::HttpConnect));
        }
    }

    let value = find_host_header(buf)?;
    let (host, port) = split_host_port(value, HTTP_DEFAULT_PORT)?;
    Some(SniffResult::new(host, port, SniffMethod::HttpHostHeader))
}

/// Value of the first `Host:` header line, with surrounding blanks removed.
fn find_host_header(buf: &[u8]) -> Option<&[u8]> {
    let mut line_start = 0;

    while line_start < buf.len() {
        let line_end = buf[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(buf.len(), |i| line_start + i);
        let line = &buf[line_start..line_end];

        if line.len() >= HOST_HEADER.len()
            && line[..HOST_HEADER.len()].eq_ignore_ascii_case(HOST_HEADER)
        {
            let value = &line[HOST_HEADER.len()..];
            let value = trim_start_blanks(value);
            let end = value
                .iter()
                .position(|&b| b == b'\r')
                .unwrap_or(value.len());
            return Some(trim_end_blanks(&value[..end]));
        }

        line_start = line_end + 1;
    }

    None
}

fn trim_start_blanks(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    bytes
}

fn trim_end_blanks(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

/// Split `host[:port]`, handling bracketed IPv6 literals.
///
/// A missing or unparsable port falls back to `default_port`. Returns `None`
/// for an empty host.
fn split_host_port(target: &[u8], default_port: u16) -> Option<(String, u16)> {
    let (host, port) = if let Some(rest) = target.strip_prefix(b"[") {
        let close = rest.iter().position(|&b| b == b']')?;
        let port = rest[close + 1..].strip_prefix(b":");
        (&rest[..close], port)
    } else {
        match target.iter().rposition(|&b| b == b':') {
            // More than one colon without brackets is a bare IPv6 address.
            Some(i) if !target[..i].contains(&b':') => (&target[..i], Some(&target[i + 1..])),
            _ => (target, None),
        }
    };

    if host.is_empty() {
        return None;
    }

    let port = port.and_then(parse_port).unwrap_or(default_port);
    Some((bounded_name(host, MAX_DOMAIN_LEN), port))
}

fn parse_port(digits: &[u8]) -> Option<u16> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
