//! TLS SNI Extractor
//!
//! Walks a TLS ClientHello to recover the `server_name` extension.
//!
//! ```text
//! Record:     ContentType(1)=22  Version(2)  Length(2)
//! Handshake:  HandshakeType(1)=1 Length(3)
//! ClientHello:
//!   ClientVersion(2)  Random(32)
//!   SessionID         len(1)  + bytes
//!   CipherSuites      len(2)  + bytes
//!   Compression       len(1)  + bytes
//!   Extensions        len(2)  + { type(2) len(2) body }*
//! server_name body:
//!   ListLength(2)  NameType(1)=0  NameLength(2)  Name
//! ```
//!
//! Each step is a pure function over `(buffer, offset)` returning the value
//! and the next offset. A failed step is `None`; the input is never touched.
//! No record defragmentation: the ClientHello must fit in this segment.

use tracing::trace;

const CONTENT_TYPE_HANDSHAKE: u8 = 22;
const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0;

const RECORD_VERSION_AND_LENGTH: usize = 4;
const HANDSHAKE_LENGTH: usize = 3;
const CLIENT_VERSION_AND_RANDOM: usize = 2 + 32;

/// Extract the SNI hostname from a TCP/443 payload.
///
/// The name is returned as sent, without lower-casing.
pub fn extract_sni(payload: &[u8]) -> Option<String> {
    let pos = 0;

    let (content_type, pos) = read_u8(payload, pos)?;
    if content_type != CONTENT_TYPE_HANDSHAKE {
        trace!("Not a TLS handshake record (0x{:02x})", content_type);
        return None;
    }
    let pos = skip(payload, pos, RECORD_VERSION_AND_LENGTH)?;

    let (handshake_type, pos) = read_u8(payload, pos)?;
    if handshake_type != HANDSHAKE_CLIENT_HELLO {
        trace!("Not a ClientHello (0x{:02x})", handshake_type);
        return None;
    }
    let pos = skip(payload, pos, HANDSHAKE_LENGTH)?;
    let pos = skip(payload, pos, CLIENT_VERSION_AND_RANDOM)?;

    // session_id, cipher_suites, compression_methods
    let (session_id_len, pos) = read_u8(payload, pos)?;
    let pos = skip(payload, pos, usize::from(session_id_len))?;
    let (cipher_suites_len, pos) = read_u16(payload, pos)?;
    let pos = skip(payload, pos, usize::from(cipher_suites_len))?;
    let (compression_len, pos) = read_u8(payload, pos)?;
    let pos = skip(payload, pos, usize::from(compression_len))?;

    let (extensions_len, pos) = read_u16(payload, pos)?;
    // Never walk past either the declared block or the bytes we have
    let end = pos.saturating_add(usize::from(extensions_len)).min(payload.len());
    let extensions = &payload[..end];

    let mut pos = pos;
    while pos < end {
        let (ext_type, next) = read_u16(extensions, pos)?;
        let (ext_len, next) = read_u16(extensions, next)?;
        let (body, next) = take(extensions, next, usize::from(ext_len))?;

        if ext_type == EXTENSION_SERVER_NAME {
            return parse_server_name(body);
        }
        pos = next;
    }

    trace!("ClientHello without server_name extension");
    None
}

/// Parse the body of a `server_name` extension (RFC 6066 §3)
fn parse_server_name(body: &[u8]) -> Option<String> {
    let (_list_len, pos) = read_u16(body, 0)?;
    let (name_type, pos) = read_u8(body, pos)?;
    if name_type != NAME_TYPE_HOST_NAME {
        trace!("Unsupported SNI name type {}", name_type);
        return None;
    }
    let (name_len, pos) = read_u16(body, pos)?;
    let (name, _) = take(body, pos, usize::from(name_len))?;

    let name = std::str::from_utf8(name).ok()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[inline]
fn read_u8(buf: &[u8], pos: usize) -> Option<(u8, usize)> {
    let byte = *buf.get(pos)?;
    Some((byte, pos + 1))
}

#[inline]
fn read_u16(buf: &[u8], pos: usize) -> Option<(u16, usize)> {
    let bytes = buf.get(pos..pos.checked_add(2)?)?;
    Some((u16::from_be_bytes([bytes[0], bytes[1]]), pos + 2))
}

#[inline]
fn take(buf: &[u8], pos: usize, len: usize) -> Option<(&[u8], usize)> {
    let end = pos.checked_add(len)?;
    let bytes = buf.get(pos..end)?;
    Some((bytes, end))
}

#[inline]
fn skip(buf: &[u8], pos: usize, len: usize) -> Option<usize> {
    take(buf, pos, len).map(|(_, next)| next)
}
