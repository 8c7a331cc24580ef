//! Normalized hostnames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize a domain for storage and comparison.
///
/// Trims surrounding whitespace, removes trailing dots and lower-cases.
/// Never fails; arbitrary input is kept (lower-cased) and simply never
/// matches a real hostname.
#[inline]
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

/// A hostname recovered from packet data, already normalized.
///
/// An empty name is not a hostname: [`Hostname::new`] returns `None` for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Normalize `raw`, returning `None` if nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_domain(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_domain("  Example.COM. "), "example.com");
        assert_eq!(normalize_domain("a.b.co"), "a.b.co");
        assert_eq!(normalize_domain("..."), "");
    }

    #[test]
    fn test_empty_is_not_a_hostname() {
        assert!(Hostname::new("").is_none());
        assert!(Hostname::new("   ").is_none());
        assert!(Hostname::new(".").is_none());
        assert_eq!(Hostname::new("WWW.Example.com").unwrap().as_str(), "www.example.com");
    }
}
