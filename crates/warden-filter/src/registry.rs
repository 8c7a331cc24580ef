//! Domain Registry
//!
//! The set of blocked domains shared between the configuration path and the
//! packet pump.
//!
//! Key properties:
//! - Exact, case-insensitive matching (`example.com` does not block
//!   `sub.example.com`)
//! - Every mutation runs under one write lock, so readers see the set either
//!   before or after it, never halfway
//! - Bulk replacement builds the new set outside the lock and swaps it in

use crate::hostname::normalize_domain;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Configuration boundary for the blocklist.
///
/// Implemented by [`DomainRegistry`]; external collaborators (a control
/// socket, a UI bridge, a config reload) talk to the engine through this.
pub trait Blocklist: Send + Sync {
    /// Block a domain. Returns `true` if it was not blocked before.
    fn add_blocked_domain(&self, domain: &str) -> bool;
    /// Unblock a domain. Returns `true` if it was blocked.
    fn remove_blocked_domain(&self, domain: &str) -> bool;
    /// Unblock everything.
    fn clear_blocked_domains(&self);
    /// Copy of the current blocklist.
    fn blocked_domains(&self) -> HashSet<String>;
}

/// Thread-safe set of normalized blocked domains
#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: RwLock<HashSet<String>>,
}

impl DomainRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `domains`
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: RwLock::new(normalize_all(domains)),
        }
    }

    // Every mutation is a single set operation, so a poisoned lock still
    // guards a consistent set.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.domains.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.domains.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a domain. Empty names are ignored.
    pub fn add(&self, domain: &str) -> bool {
        let normalized = normalize_domain(domain);
        if normalized.is_empty() {
            return false;
        }
        let added = self.write().insert(normalized);
        debug!("Added blocked domain: {}", domain);
        added
    }

    /// Remove a domain
    pub fn remove(&self, domain: &str) -> bool {
        let normalized = normalize_domain(domain);
        let removed = self.write().remove(&normalized);
        debug!("Removed blocked domain: {}", domain);
        removed
    }

    /// Remove every domain
    pub fn clear(&self) {
        self.write().clear();
        debug!("Cleared all blocked domains");
    }

    /// Exact, case-insensitive membership test
    #[inline]
    pub fn contains(&self, domain: &str) -> bool {
        let normalized = normalize_domain(domain);
        self.read().contains(&normalized)
    }

    /// Copy of the current set
    pub fn snapshot(&self) -> HashSet<String> {
        self.read().clone()
    }

    /// Add many domains in one step
    pub fn extend<I, S>(&self, domains: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let incoming = normalize_all(domains);
        let mut set = self.write();
        let before = set.len();
        set.extend(incoming);
        set.len() - before
    }

    /// Replace the whole list in one step
    pub fn replace_all<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fresh = normalize_all(domains);
        let count = fresh.len();
        *self.write() = fresh;
        info!("Blocklist replaced: {} domains", count);
    }

    /// Number of blocked domains
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Blocklist for DomainRegistry {
    fn add_blocked_domain(&self, domain: &str) -> bool {
        self.add(domain)
    }

    fn remove_blocked_domain(&self, domain: &str) -> bool {
        self.remove(domain)
    }

    fn clear_blocked_domains(&self) {
        self.clear()
    }

    fn blocked_domains(&self) -> HashSet<String> {
        self.snapshot()
    }
}

fn normalize_all<I, S>(domains: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    domains
        .into_iter()
        .map(|d| normalize_domain(d.as_ref()))
        .filter(|d| !d.is_empty())
        .collect()
}
