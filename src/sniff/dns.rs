//! Question name extraction from raw DNS messages.

use thiserror::Error;

use super::{MAX_DOMAIN_LEN, SniffMethod, SniffResult};

const HEADER_LEN: usize = 12;

/// Why no question name could be decoded.
///
/// The `Display` text doubles as the placeholder that gets logged in place
/// of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("invalid-pkt")]
    TooShort,
    /// A label starts with a compression pointer. The question name sits at
    /// a fixed offset and never needs one, so pointers are not followed.
    #[error("compressed")]
    Compressed,
}

/// Decode the question name at offset 12 as dot-joined labels.
///
/// At most `capacity` bytes are produced. A label running past the end of
/// the packet is cut short and decoding stops with what was collected, as
/// does a name that reaches the end of the packet without a terminator.
pub fn decode_question_name(packet: &[u8], capacity: usize) -> Result<String, NameError> {
    if packet.len() < HEADER_LEN {
        return Err(NameError::TooShort);
    }

    let mut out: Vec<u8> = Vec::with_capacity(capacity.min(64));
    let mut pos = HEADER_LEN;

    while let Some(&len) = packet.get(pos) {
        if len == 0 || out.len() >= capacity {
            break;
        }
        if len & 0xc0 == 0xc0 {
            return Err(NameError::Compressed);
        }
        pos += 1;

        if !out.is_empty() {
            out.push(b'.');
        }

        let end = (pos + len as usize).min(packet.len());
        let room = capacity.saturating_sub(out.len());
        let label = &packet[pos..end];
        out.extend_from_slice(&label[..label.len().min(room)]);
        pos = end;
    }

    out.truncate(capacity);
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Question name of `packet`, or the placeholder describing why there is none.
pub fn question_name(packet: &[u8]) -> String {
    decode_question_name(packet, MAX_DOMAIN_LEN).unwrap_or_else(|e| e.to_string())
}

/// Sniff a DNS query datagram.
pub fn sniff(packet: &[u8]) -> SniffResult {
    match decode_question_name(packet, MAX_DOMAIN_LEN) {
        Ok(name) => SniffResult::new(name, 53, SniffMethod::DnsQuestion),
        Err(e) => SniffResult::new(e.to_string(), 0, SniffMethod::None),
    }
}
