//! Policy Decision Engine
//!
//! Turns an inspected frame into a verdict.
//!
//! Flow:
//! 1. TCP destination address → [`AddressPolicy`] (allow-all by default)
//! 2. Hostname recovered → normalize → report the visit exactly once
//! 3. Registry lookup (exact match) → `Drop` if blocked
//! 4. Everything else → `Forward` (fail open)

use crate::hostname::Hostname;
use crate::inspect::{HostSource, Inspection, inspect};
use crate::ipv4::Protocol;
use crate::registry::DomainRegistry;
use crate::report::{NullSink, Visit, VisitSink};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

/// What to do with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Write the original bytes to the interface
    Forward,
    /// Write nothing
    Drop,
}

/// Destination-address blocking hook.
///
/// Consulted for TCP segments before payload inspection. The default
/// policy never blocks; no IP-literal rules are enforced unless an
/// embedder installs its own policy.
pub trait AddressPolicy: Send + Sync {
    fn is_blocked(&self, _destination: Ipv4Addr) -> bool {
        false
    }
}

/// Policy that blocks no address
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAddresses;

impl AddressPolicy for AllowAllAddresses {}

/// Decides forward/drop for each frame and reports visits
pub struct PolicyEngine {
    registry: Arc<DomainRegistry>,
    sink: Arc<dyn VisitSink>,
    addresses: Arc<dyn AddressPolicy>,
}

impl PolicyEngine {
    /// Create an engine over `registry` that reports to `sink`
    pub fn new(registry: Arc<DomainRegistry>, sink: Arc<dyn VisitSink>) -> Self {
        Self {
            registry,
            sink,
            addresses: Arc::new(AllowAllAddresses),
        }
    }

    /// Engine that discards visit reports
    pub fn without_reporting(registry: Arc<DomainRegistry>) -> Self {
        Self::new(registry, Arc::new(NullSink))
    }

    /// Install a destination-address policy
    pub fn with_address_policy(mut self, policy: Arc<dyn AddressPolicy>) -> Self {
        self.addresses = policy;
        self
    }

    /// Shared registry handle
    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    /// Decide for an already-extracted hostname.
    ///
    /// Reports the normalized name once (blocked or not), then checks the
    /// registry. `None` or an empty name always forwards.
    pub fn decide(&self, raw_host: Option<&str>, source: HostSource) -> Verdict {
        let Some(host) = raw_host.and_then(Hostname::new) else {
            return Verdict::Forward;
        };

        let blocked = self.registry.contains(host.as_str());
        self.sink
            .record_visit(&Visit::new(host.as_str(), source, blocked));

        if blocked {
            debug!("Blocking {} request for: {}", source, host);
            Verdict::Drop
        } else {
            Verdict::Forward
        }
    }

    /// Decide for an inspected frame
    pub fn judge(&self, inspection: &Inspection) -> Verdict {
        match inspection {
            Inspection::Opaque | Inspection::Unclassified { .. } => Verdict::Forward,
            Inspection::TcpUnnamed { destination, port } => {
                if self.addresses.is_blocked(*destination) {
                    debug!("Blocking TCP connection to: {}:{}", destination, port);
                    Verdict::Drop
                } else {
                    Verdict::Forward
                }
            }
            Inspection::Host {
                destination,
                protocol,
                port,
                source,
                raw,
            } => {
                if *protocol == Protocol::Tcp && self.addresses.is_blocked(*destination) {
                    debug!("Blocking TCP connection to: {}:{}", destination, port);
                    return Verdict::Drop;
                }
                self.decide(Some(raw.as_str()), *source)
            }
        }
    }

    /// Inspect and decide a raw frame
    #[inline]
    pub fn evaluate(&self, frame: &[u8]) -> Verdict {
        self.judge(&inspect(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::tests::query;
    use crate::inspect::frames::{ipv4, tcp, udp};
    use crate::report::visit_channel;
    use crate::tls::tests::client_hello_for;
    use crossbeam_channel::Receiver;

    fn engine_with(domains: &[&str]) -> (PolicyEngine, Receiver<Visit>) {
        let registry = Arc::new(DomainRegistry::with_domains(domains.iter().copied()));
        let (sink, rx) = visit_channel(64);
        (PolicyEngine::new(registry, Arc::new(sink)), rx)
    }

    #[test]
    fn test_blocked_sni_drops_and_reports_once() {
        let (engine, rx) = engine_with(&["example.com"]);
        let frame = tcp(443, &client_hello_for("example.com"));

        assert_eq!(engine.evaluate(&frame), Verdict::Drop);
        let visits: Vec<Visit> = rx.try_iter().collect();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].host, "example.com");
        assert_eq!(visits[0].source, HostSource::Tls);
        assert!(visits[0].blocked);
    }

    #[test]
    fn test_unblocked_forwards_and_reports_once() {
        let (engine, rx) = engine_with(&["example.com"]);
        engine.registry().remove("example.com");
        let frame = tcp(443, &client_hello_for("example.com"));

        assert_eq!(engine.evaluate(&frame), Verdict::Forward);
        let visits: Vec<Visit> = rx.try_iter().collect();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].host, "example.com");
        assert!(!visits[0].blocked);
    }

    #[test]
    fn test_hostname_normalized_before_lookup() {
        let (engine, rx) = engine_with(&["example.com"]);
        let frame = tcp(80, b"GET / HTTP/1.1\r\nHost: EXAMPLE.com.\r\n\r\n");

        assert_eq!(engine.evaluate(&frame), Verdict::Drop);
        assert_eq!(rx.try_recv().unwrap().host, "example.com");
    }

    #[test]
    fn test_subdomain_not_blocked() {
        let (engine, rx) = engine_with(&["example.com"]);
        let frame = udp(53, &query(&["sub", "example", "com"]));

        assert_eq!(engine.evaluate(&frame), Verdict::Forward);
        assert_eq!(rx.try_recv().unwrap().host, "sub.example.com");
    }

    #[test]
    fn test_blocked_dns_query() {
        let (engine, _rx) = engine_with(&["a.b.co"]);
        let frame = udp(53, &query(&["A", "b", "CO"]));
        assert_eq!(engine.evaluate(&frame), Verdict::Drop);
    }

    #[test]
    fn test_no_hostname_forwards_without_report() {
        let (engine, rx) = engine_with(&["example.com"]);

        assert_eq!(engine.evaluate(&[0x60, 0, 0, 0]), Verdict::Forward);
        assert_eq!(engine.evaluate(&ipv4(1, &[8, 0, 0, 0])), Verdict::Forward);
        assert_eq!(engine.evaluate(&tcp(22, b"SSH-2.0-OpenSSH\r\n")), Verdict::Forward);
        assert_eq!(engine.decide(None, HostSource::Dns), Verdict::Forward);
        assert_eq!(engine.decide(Some("  "), HostSource::Http), Verdict::Forward);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_dns_forwards() {
        let (engine, rx) = engine_with(&["example.com"]);
        let long = "x".repeat(64);
        let frame = udp(53, &query(&[long.as_str(), "com"]));
        assert_eq!(engine.evaluate(&frame), Verdict::Forward);
        assert!(rx.try_recv().is_err());
    }

    struct BlockOne(Ipv4Addr);

    impl AddressPolicy for BlockOne {
        fn is_blocked(&self, destination: Ipv4Addr) -> bool {
            destination == self.0
        }
    }

    #[test]
    fn test_default_address_policy_never_blocks() {
        assert!(!AllowAllAddresses.is_blocked(Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn test_address_policy_hook() {
        let (engine, rx) = engine_with(&[]);
        let engine = engine.with_address_policy(Arc::new(BlockOne(Ipv4Addr::new(93, 184, 216, 34))));

        assert_eq!(engine.evaluate(&tcp(22, &[])), Verdict::Drop);
        assert_eq!(engine.evaluate(&tcp(443, &client_hello_for("ok.com"))), Verdict::Drop);
        // Address rules apply to TCP only
        assert_eq!(engine.evaluate(&udp(53, &query(&["ok", "com"]))), Verdict::Forward);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
