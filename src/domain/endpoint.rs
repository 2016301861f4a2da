//! Endpoint descriptors.

use serde::{Deserialize, Serialize};

/// One logical remote service reachable via a primary address and optional
/// backups.
///
/// Immutable once loaded. Addresses are indexed with the primary at `0` and
/// backups following in configured order, which is the order every
/// fallback pass walks them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Unique key for the endpoint.
    pub name: String,
    /// Primary address (e.g. `ws://localhost:3001`).
    pub url: String,
    /// Backup addresses tried in order once the primary is exhausted.
    #[serde(default)]
    pub backup_urls: Vec<String>,
    /// Lower values start first and sort first in snapshots.
    #[serde(default)]
    pub priority: u32,
}

impl EndpointConfig {
    /// Create an endpoint with no backups and default priority.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            backup_urls: Vec::new(),
            priority: 0,
        }
    }

    /// Append a backup address.
    #[must_use]
    pub fn with_backup(mut self, url: impl Into<String>) -> Self {
        self.backup_urls.push(url.into());
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Total number of addresses (primary plus backups).
    #[must_use]
    pub fn address_count(&self) -> usize {
        1 + self.backup_urls.len()
    }

    /// Address at `index`, where `0` is the primary.
    #[must_use]
    pub fn address(&self, index: usize) -> Option<&str> {
        if index == 0 {
            Some(&self.url)
        } else {
            self.backup_urls.get(index - 1).map(String::as_str)
        }
    }

    /// All addresses, primary first.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url.as_str()).chain(self.backup_urls.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_primary_first() {
        let endpoint = EndpointConfig::new("pulse", "ws://a")
            .with_backup("ws://b")
            .with_backup("ws://c");

        assert_eq!(endpoint.address_count(), 3);
        assert_eq!(endpoint.address(0), Some("ws://a"));
        assert_eq!(endpoint.address(2), Some("ws://c"));
        assert_eq!(endpoint.address(3), None);
        assert_eq!(
            endpoint.addresses().collect::<Vec<_>>(),
            vec!["ws://a", "ws://b", "ws://c"]
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let endpoint: EndpointConfig =
            toml::from_str("name = \"seams\"\nurl = \"ws://localhost:3002\"").unwrap();
        assert!(endpoint.backup_urls.is_empty());
        assert_eq!(endpoint.priority, 0);
    }
}
