//! Warden Filter Engine
//!
//! Hostname-based packet filtering over raw IPv4 frames.
//!
//! Architecture:
//! 1. Frame comes in → IPv4 / UDP / TCP views (no copies)
//! 2. DNS, HTTP or TLS payload → hostname extractor
//! 3. Hostname → visit report + exact registry lookup
//! 4. Verdict → forward the original bytes or drop them
//!
//! Every parser is tolerant: malformed input yields "no hostname" and the
//! frame is forwarded unchanged (fail open).

mod blocklist;
mod dns;
mod hostname;
mod http;
mod inspect;
mod ipv4;
mod policy;
mod registry;
mod report;
mod tls;

pub use blocklist::{BlocklistError, host_of_rule, load_rules, parse_rules};
pub use dns::extract_query_name;
pub use hostname::{Hostname, normalize_domain};
pub use http::extract_host_header;
pub use inspect::{HostSource, Inspection, inspect};
pub use ipv4::{Ipv4Frame, Protocol, TcpSegment, UdpDatagram};
pub use policy::{AddressPolicy, AllowAllAddresses, PolicyEngine, Verdict};
pub use registry::{Blocklist, DomainRegistry};
pub use report::{ChannelSink, NullSink, Visit, VisitSink, visit_channel};
pub use tls::extract_sni;

/// Well-known destination ports the engine inspects.
pub mod ports {
    /// DNS over UDP
    pub const DNS: u16 = 53;
    /// Plain HTTP
    pub const HTTP: u16 = 80;
    /// HTTPS (TLS)
    pub const HTTPS: u16 = 443;
}
