//! Blocklist file parser
//!
//! Accepts the common list formats, one rule per line:
//! - Hosts files: `0.0.0.0 ads.example.com`, `127.0.0.1 tracker.example.com`
//! - Adblock domain rules: `||doubleclick.net^`
//! - Plain domains or URLs: `example.com`, `https://example.com/path`
//! - Comments (`#`, `!`, `[Adblock Plus 2.0]`) and blank lines are skipped
//!
//! Output is normalized and deduplicated, ready for
//! [`DomainRegistry::replace_all`](crate::DomainRegistry::replace_all).

use crate::hostname::normalize_domain;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors while loading a blocklist file
#[derive(Debug, Error)]
pub enum BlocklistError {
    #[error("failed to read blocklist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Names that appear in every hosts file and must never be blocked
const SYSTEM_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
    "0.0.0.0",
];

/// Longest possible DNS name
const MAX_NAME_LEN: usize = 253;

/// Parse a blocklist into sorted, normalized, unique domains
pub fn parse_rules(content: &str) -> Vec<String> {
    let domains: BTreeSet<String> = content.lines().filter_map(host_of_rule).collect();
    domains.into_iter().collect()
}

/// Extract the domain a single rule line blocks, if any
pub fn host_of_rule(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') || line.starts_with('[') {
        return None;
    }

    // Drop trailing "# comment"
    let line = line.split('#').next()?.trim();

    let candidate = if let Some(rule) = line.strip_prefix("||") {
        // ||domain.com^$third-party
        rule.split(['^', '/', '$']).next()?
    } else {
        let mut fields = line.split_whitespace();
        let first = fields.next()?;
        match fields.next() {
            // "<address> <name>"
            Some(name) if is_address(first) => name,
            Some(_) => return None,
            None => strip_url(first),
        }
    };

    let domain = normalize_domain(candidate);
    if domain.is_empty()
        || !domain.contains('.')
        || domain.len() > MAX_NAME_LEN
        || SYSTEM_NAMES.contains(&domain.as_str())
        || domain.contains(|c: char| c.is_whitespace() || c == '*')
    {
        return None;
    }
    Some(domain)
}

/// Load and parse a blocklist file
pub fn load_rules(path: &Path) -> Result<Vec<String>, BlocklistError> {
    let content = std::fs::read_to_string(path).map_err(|source| BlocklistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let domains = parse_rules(&content);
    info!("Loaded blocklist '{}': {} domains", path.display(), domains.len());
    Ok(domains)
}

fn is_address(field: &str) -> bool {
    field.parse::<std::net::IpAddr>().is_ok()
}

/// `https://host:8080/path?q` → `host`
fn strip_url(entry: &str) -> &str {
    let rest = entry
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(entry);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}
