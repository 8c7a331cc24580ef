//! DNS Query Extractor
//!
//! Recovers the QNAME of the first question in an outbound DNS query
//! (RFC 1035 §4.1.2). Only uncompressed names are understood: queries
//! never need compression, so a pointer label ends extraction.

use tracing::trace;

/// Fixed DNS header size: ID, flags, QDCOUNT, ANCOUNT, NSCOUNT, ARCOUNT
pub const DNS_HEADER_SIZE: usize = 12;

/// Longest label allowed by RFC 1035
const MAX_LABEL_LEN: usize = 63;

/// Extract the queried name from a UDP/53 payload (the DNS message).
///
/// Returns the lower-cased dotted name, or `None` if the message is too
/// short, a label overruns the buffer, a label length is outside 1..=63
/// (including compression pointers), or the name is empty.
pub fn extract_query_name(message: &[u8]) -> Option<String> {
    if message.len() < DNS_HEADER_SIZE {
        trace!("DNS message too short: {} bytes", message.len());
        return None;
    }

    let mut name = String::new();
    let mut pos = DNS_HEADER_SIZE;

    // Each iteration consumes at least one byte, so the loop is bounded by
    // the message length.
    while let Some(&len) = message.get(pos) {
        pos += 1;
        let len = usize::from(len);

        if len == 0 {
            break;
        }
        if len > MAX_LABEL_LEN {
            trace!("Unsupported DNS label length byte 0x{:02x}", len);
            return None;
        }

        let label = message.get(pos..pos + len)?;
        pos += len;

        if !name.is_empty() {
            name.push('.');
        }
        name.extend(label.iter().map(|&b| char::from(b)));
    }

    let name = name.to_lowercase();
    if name.is_empty() { None } else { Some(name) }
}
