//! Frame classification
//!
//! Routes a raw frame through the IPv4 / transport views to the extractor
//! matching its destination port:
//!
//! | Transport | Port | Extractor |
//! |-----------|------|-----------|
//! | UDP       | 53   | DNS QNAME |
//! | TCP       | 80   | HTTP `Host:` |
//! | TCP       | 443  | TLS SNI |

use crate::dns::extract_query_name;
use crate::http::extract_host_header;
use crate::ipv4::{Ipv4Frame, Protocol, TcpSegment, UdpDatagram};
use crate::ports;
use crate::tls::extract_sni;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Protocol a hostname was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostSource {
    Dns,
    Http,
    Tls,
}

impl fmt::Display for HostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns => write!(f, "dns"),
            Self::Http => write!(f, "http"),
            Self::Tls => write!(f, "tls"),
        }
    }
}

/// What the engine learned about one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// Not IPv4, or a header failed validation
    Opaque,
    /// Valid IPv4 but nothing hostname-bearing
    Unclassified {
        destination: Ipv4Addr,
        protocol: Protocol,
    },
    /// TCP segment whose payload did not yield a hostname
    TcpUnnamed {
        destination: Ipv4Addr,
        port: u16,
    },
    /// A hostname was recovered (raw, not yet normalized)
    Host {
        destination: Ipv4Addr,
        protocol: Protocol,
        port: u16,
        source: HostSource,
        raw: String,
    },
}

impl Inspection {
    /// Raw hostname, if one was recovered
    pub fn raw_host(&self) -> Option<&str> {
        match self {
            Self::Host { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Classify a frame. Pure; never fails.
pub fn inspect(frame: &[u8]) -> Inspection {
    let Some(ip) = Ipv4Frame::parse(frame) else {
        return Inspection::Opaque;
    };

    match ip.protocol {
        Protocol::Udp => inspect_udp(&ip),
        Protocol::Tcp => inspect_tcp(&ip),
        Protocol::Other(_) => Inspection::Unclassified {
            destination: ip.destination,
            protocol: ip.protocol,
        },
    }
}

fn inspect_udp(ip: &Ipv4Frame<'_>) -> Inspection {
    let Some(udp) = UdpDatagram::parse(ip.payload) else {
        return Inspection::Opaque;
    };

    if udp.destination_port == ports::DNS {
        if let Some(raw) = extract_query_name(udp.payload) {
            return Inspection::Host {
                destination: ip.destination,
                protocol: Protocol::Udp,
                port: udp.destination_port,
                source: HostSource::Dns,
                raw,
            };
        }
    }

    Inspection::Unclassified {
        destination: ip.destination,
        protocol: Protocol::Udp,
    }
}

fn inspect_tcp(ip: &Ipv4Frame<'_>) -> Inspection {
    let Some(tcp) = TcpSegment::parse(ip.payload) else {
        return Inspection::Opaque;
    };

    let extracted = if tcp.payload.is_empty() {
        None
    } else {
        match tcp.destination_port {
            ports::HTTPS => extract_sni(tcp.payload).map(|raw| (HostSource::Tls, raw)),
            ports::HTTP => extract_host_header(tcp.payload).map(|raw| (HostSource::Http, raw)),
            _ => None,
        }
    };

    match extracted {
        Some((source, raw)) => Inspection::Host {
            destination: ip.destination,
            protocol: Protocol::Tcp,
            port: tcp.destination_port,
            source,
            raw,
        },
        None => Inspection::TcpUnnamed {
            destination: ip.destination,
            port: tcp.destination_port,
        },
    }
}
