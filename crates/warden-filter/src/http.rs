//! HTTP Host Extractor
//!
//! Finds the `Host:` header of a plaintext HTTP/1.x request. The payload is
//! treated as single-byte text, so arbitrary bytes never fail to decode.

/// Extract the `Host` header value from a TCP/80 payload.
///
/// Prefers a `Host:` that starts a line (`\r\nHost:`), falling back to the
/// first `Host:` anywhere. The value runs to the next `\r` (or `\n`, or the
/// end of the payload) and is trimmed. Matching is ASCII case-insensitive.
pub fn extract_host_header(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }

    let lowered = payload.to_ascii_lowercase();
    let start = find(&lowered, b"\r\nhost:").or_else(|| find(&lowered, b"host:"))?;

    let colon = start + payload[start..].iter().position(|&b| b == b':')?;
    let value_start = colon + 1;
    let rest = &payload[value_start..];

    let value_end = rest
        .iter()
        .position(|&b| b == b'\r')
        .or_else(|| rest.iter().position(|&b| b == b'\n'))
        .unwrap_or(rest.len());

    let host = latin1(&rest[..value_end]);
    let host = host.trim();
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// ISO-8859-1: every byte maps to the code point of the same value
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
