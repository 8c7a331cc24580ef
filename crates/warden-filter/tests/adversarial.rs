//! Hostile-input properties: every parser terminates without panicking and
//! without reading outside the buffer, whatever the bytes claim.

use proptest::prelude::*;
use std::sync::Arc;
use warden_filter::{
    DomainRegistry, PolicyEngine, Verdict, extract_host_header, extract_query_name, extract_sni,
    inspect,
};

/// IPv4 + TCP header with data offset 5, followed by `payload`
fn tcp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 40];
    frame[0] = 0x45;
    frame[9] = 6;
    frame[16..20].copy_from_slice(&[10, 1, 2, 3]);
    frame[22..24].copy_from_slice(&dst_port.to_be_bytes());
    frame[32] = 5 << 4;
    frame.extend_from_slice(payload);
    frame
}

fn udp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 28];
    frame[0] = 0x45;
    frame[9] = 17;
    frame[22..24].copy_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// A TLS record prefix whose every length field claims the maximum
fn maximal_client_hello() -> Vec<u8> {
    let mut record = vec![0x16, 0x03, 0x01, 0xFF, 0xFF, 0x01, 0xFF, 0xFF, 0xFF, 0x03, 0x03];
    record.extend_from_slice(&[0u8; 32]);
    record.push(0xFF);
    record
}

proptest! {
    #[test]
    fn inspect_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = inspect(&frame);
    }

    #[test]
    fn ipv4_header_bytes_never_panic(
        version_ihl in any::<u8>(),
        protocol in prop_oneof![Just(6u8), Just(17u8), any::<u8>()],
        rest in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let mut frame = vec![version_ihl, 0, 0, 0, 0, 0, 0, 0, 64, protocol];
        frame.extend_from_slice(&rest);
        let _ = inspect(&frame);
    }

    #[test]
    fn sni_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let _ = extract_sni(&payload);
    }

    #[test]
    fn sni_with_maximal_lengths_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut payload = maximal_client_hello();
        payload.extend_from_slice(&tail);
        let _ = extract_sni(&payload);
        let _ = inspect(&tcp_frame(443, &payload));
    }

    #[test]
    fn dns_never_panics(message in proptest::collection::vec(any::<u8>(), 0..600)) {
        if let Some(name) = extract_query_name(&message) {
            prop_assert!(!name.is_empty());
            prop_assert_eq!(name.to_lowercase(), name.clone());
        }
        let _ = inspect(&udp_frame(53, &message));
    }

    #[test]
    fn dns_label_lengths_are_bounded(labels in proptest::collection::vec(any::<u8>(), 1..16)) {
        // Each byte is used as a label length with no label body behind it
        let mut message = vec![0u8; 12];
        message.extend_from_slice(&labels);
        if let Some(name) = extract_query_name(&message) {
            prop_assert!(name.len() <= message.len());
        }
    }

    #[test]
    fn http_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
        if let Some(host) = extract_host_header(&payload) {
            prop_assert!(!host.is_empty());
            prop_assert_eq!(host.trim(), host.as_str());
        }
    }

    #[test]
    fn http_host_header_is_found(host in "[a-z]{1,20}(\\.[a-z]{1,10}){1,3}", path in "/[a-z0-9]{0,16}") {
        let request = format!("GET {} HTTP/1.1\r\nUser-Agent: t\r\nHost: {}\r\n\r\n", path, host);
        prop_assert_eq!(extract_host_header(request.as_bytes()), Some(host));
    }

    #[test]
    fn unblocked_traffic_is_always_forwarded(frame in proptest::collection::vec(any::<u8>(), 0..512)) {
        let engine = PolicyEngine::without_reporting(Arc::new(DomainRegistry::new()));
        prop_assert_eq!(engine.evaluate(&frame), Verdict::Forward);
    }
}
