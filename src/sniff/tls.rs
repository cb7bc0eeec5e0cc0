//! Server Name Indication extraction from a TLS ClientHello.
//!
//! Walks the record header, the handshake header and the ClientHello body
//! (RFC 5246 7.4.1.2) down to the server_name extension (RFC 6066 3). Each
//! length-prefixed field is read through a [`Cursor`] scoped to its parent,
//! so an overstated length fails the parse instead of reading beyond it.

use thiserror::Error;

use super::cursor::{Cursor, ReadError};
use super::{SniffMethod, SniffResult, bounded_name};

const RECORD_HEADER_LEN: usize = 5;
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const TLS_MAJOR_VERSION: u8 = 0x03;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const RANDOM_LEN: usize = 32;
const EXT_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0x00;

const TLS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlsError {
    #[error("shorter than a record header")]
    TooShort,
    #[error("record type {0:#04x} is not a handshake")]
    NotHandshake(u8),
    #[error("unsupported major version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("record length {declared} exceeds the {available} bytes received")]
    RecordOverrun { declared: usize, available: usize },
    #[error("handshake type {0:#04x} is not a ClientHello")]
    NotClientHello(u8),
    #[error("handshake length {declared} exceeds the {available} byte record")]
    HandshakeOverrun { declared: usize, available: usize },
    #[error("malformed ClientHello: {0}")]
    Truncated(#[from] ReadError),
    #[error("no server_name extension")]
    NoServerName,
}

/// Raw host name from the first `host_name` entry of the SNI extension.
pub fn server_name(buf: &[u8]) -> Result<&[u8], TlsError> {
    if buf.len() < RECORD_HEADER_LEN {
        return Err(TlsError::TooShort);
    }

    let mut record = Cursor::new(buf);
    let content_type = record.read_u8()?;
    if content_type != CONTENT_TYPE_HANDSHAKE {
        return Err(TlsError::NotHandshake(content_type));
    }
    let major = record.read_u8()?;
    if major != TLS_MAJOR_VERSION {
        return Err(TlsError::UnsupportedVersion(major));
    }
    record.skip(1)?; // minor version
    let declared = record.read_u16()? as usize;
    if declared > record.remaining() {
        return Err(TlsError::RecordOverrun {
            declared,
            available: record.remaining(),
        });
    }
    let mut payload = record.sub(declared)?;

    let handshake_type = payload.read_u8()?;
    if handshake_type != HANDSHAKE_CLIENT_HELLO {
        return Err(TlsError::NotClientHello(handshake_type));
    }
    let declared = payload.read_u24()? as usize;
    if declared > payload.remaining() {
        return Err(TlsError::HandshakeOverrun {
            declared,
            available: payload.remaining(),
        });
    }
    let mut hello = payload.sub(declared)?;

    hello.skip(2)?; // client_version
    hello.skip(RANDOM_LEN)?;
    hello.sub_u8()?; // session_id
    hello.sub_u16()?; // cipher_suites
    hello.sub_u8()?; // compression_methods

    if hello.is_empty() {
        return Err(TlsError::NoServerName);
    }
    let mut extensions = hello.sub_u16()?;

    while !extensions.is_empty() {
        let ext_type = extensions.read_u16()?;
        let mut data = extensions.sub_u16()?;
        if ext_type == EXT_SERVER_NAME {
            return host_name(&mut data);
        }
    }

    Err(TlsError::NoServerName)
}

fn host_name<'a>(data: &mut Cursor<'a>) -> Result<&'a [u8], TlsError> {
    let mut list = data.sub_u16()?;

    while !list.is_empty() {
        let name_type = list.read_u8()?;
        let mut name = list.sub_u16()?;
        if name_type == NAME_TYPE_HOST_NAME {
            let len = name.remaining();
            return Ok(name.take(len)?);
        }
    }

    Err(TlsError::NoServerName)
}

/// Sniff the SNI host of a ClientHello, truncated to `capacity` bytes.
pub fn sniff(buf: &[u8], capacity: usize) -> Result<SniffResult, TlsError> {
    let name = server_name(buf)?;
    Ok(SniffResult::new(
        bounded_name(name, capacity),
        TLS_PORT,
        SniffMethod::TlsSni,
    ))
}
