//! IPv4, UDP and TCP views
//!
//! Read-only projections over a frame. Anything that does not validate is
//! `None`, which callers treat as "opaque, forward unchanged".
//!
//! ```text
//!  0      4      8             16                      31
//! +------+------+-------------+------------------------+
//! | ver  | ihl  |    tos      |      total length      |
//! +------+------+-------------+------------------------+
//! |       ...          | protocol (byte 9) |   ...     |
//! +----------------------------------------------------+
//! |        destination address (bytes 16..20)          |
//! +----------------------------------------------------+
//! ```

use std::net::Ipv4Addr;

/// Minimum IPv4 header size (IHL = 5)
pub const MIN_IPV4_HEADER: usize = 20;

/// UDP header size
pub const UDP_HEADER: usize = 8;

/// Minimum TCP header size (data offset = 5)
pub const MIN_TCP_HEADER: usize = 20;

/// Transport protocol carried by an IPv4 frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Protocol 6
    Tcp,
    /// Protocol 17
    Udp,
    /// Anything else (passed through)
    Other(u8),
}

impl From<u8> for Protocol {
    fn from(value: u8) -> Self {
        match value {
            6 => Self::Tcp,
            17 => Self::Udp,
            other => Self::Other(other),
        }
    }
}

/// Parsed IPv4 header plus the bytes that follow it
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Frame<'a> {
    /// Header length in bytes (IHL × 4)
    pub header_len: usize,
    pub protocol: Protocol,
    pub destination: Ipv4Addr,
    /// Everything after the IP header
    pub payload: &'a [u8],
}

impl<'a> Ipv4Frame<'a> {
    /// Parse an IPv4 frame.
    ///
    /// Requires version 4 and `20 <= IHL * 4 <= frame.len()`.
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        if frame.len() < MIN_IPV4_HEADER {
            return None;
        }
        if frame[0] >> 4 != 4 {
            return None;
        }
        let header_len = usize::from(frame[0] & 0x0F) * 4;
        if header_len < MIN_IPV4_HEADER || header_len > frame.len() {
            return None;
        }

        Some(Self {
            header_len,
            protocol: Protocol::from(frame[9]),
            destination: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
            payload: &frame[header_len..],
        })
    }
}

/// UDP datagram view
#[derive(Debug, Clone, Copy)]
pub struct UdpDatagram<'a> {
    pub destination_port: u16,
    /// Bytes after the 8-byte UDP header
    pub payload: &'a [u8],
}

impl<'a> UdpDatagram<'a> {
    pub fn parse(segment: &'a [u8]) -> Option<Self> {
        if segment.len() < UDP_HEADER {
            return None;
        }
        Some(Self {
            destination_port: u16::from_be_bytes([segment[2], segment[3]]),
            payload: &segment[UDP_HEADER..],
        })
    }
}

/// TCP segment view
#[derive(Debug, Clone, Copy)]
pub struct TcpSegment<'a> {
    pub destination_port: u16,
    /// Header length in bytes (data offset × 4)
    pub header_len: usize,
    /// Bytes after the TCP header (may be empty)
    pub payload: &'a [u8],
}

impl<'a> TcpSegment<'a> {
    /// Parse a TCP segment.
    ///
    /// Requires a full 20-byte header and `20 <= data offset * 4 <= len`.
    pub fn parse(segment: &'a [u8]) -> Option<Self> {
        if segment.len() < MIN_TCP_HEADER {
            return None;
        }
        let header_len = usize::from(segment[12] >> 4) * 4;
        if header_len < MIN_TCP_HEADER || header_len > segment.len() {
            return None;
        }
        Some(Self {
            destination_port: u16::from_be_bytes([segment[2], segment[3]]),
            header_len,
            payload: &segment[header_len..],
        })
    }
}
