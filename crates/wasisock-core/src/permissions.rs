//! Capability-based network permissions.
//!
//! This module provides the [`Permissions`] struct, which defines which
//! hosts a socket user may resolve and connect to.

use std::collections::HashSet;
use std::net::IpAddr;

use wasisock_common::SocketConfig;

/// Network permission configuration.
///
/// # Security Philosophy
///
/// We follow the principle of least privilege:
/// - By default, nothing is allowed
/// - Each capability must be explicitly granted
/// - Permissions are immutable once a provider is guarded by them
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    /// Allowed hostname patterns.
    ///
    /// Patterns can be:
    /// - Exact match: `api.example.com`
    /// - Wildcard subdomain: `*.example.com` (matches `api.example.com`, `example.com`)
    /// - All hosts: `*`
    pub allowed_hosts: HashSet<String>,

    /// Enable socket access at all.
    pub network_enabled: bool,

    /// Refuse connections to non-public addresses.
    pub block_private_addresses: bool,

    /// Maximum simultaneously open sockets.
    pub max_open_sockets: u32,
}

impl Permissions {
    /// Create a permission set with all capabilities disabled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a permission set allowing every host, including private ones.
    ///
    /// # Warning
    ///
    /// This is intended for development/testing only.
    pub fn all() -> Self {
        let mut allowed_hosts = HashSet::new();
        allowed_hosts.insert("*".to_string());

        Self {
            allowed_hosts,
            network_enabled: true,
            block_private_addresses: false,
            max_open_sockets: 64,
        }
    }

    /// Build permissions from the `[runtime.sockets]` configuration.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self {
            allowed_hosts: config.allowed_hosts.iter().cloned().collect(),
            network_enabled: config.network_enabled,
            block_private_addresses: config.block_private_addresses,
            max_open_sockets: config.max_open_sockets,
        }
    }

    /// Create a builder for constructing permissions.
    pub fn builder() -> PermissionsBuilder {
        PermissionsBuilder::default()
    }

    /// Check if resolving `host` is allowed.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        if !self.network_enabled {
            return false;
        }

        if self.allowed_hosts.contains("*") {
            return true;
        }

        let host = host.trim_end_matches('.').to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|pattern| Self::matches_pattern(pattern, &host))
    }

    /// Check if a host matches a permission pattern.
    fn matches_pattern(pattern: &str, host: &str) -> bool {
        let pattern = pattern.to_lowercase();

        if let Some(bare) = pattern.strip_prefix("*.") {
            host == bare || host.ends_with(&pattern[1..])
        } else {
            pattern == host
        }
    }

    /// Check if connecting to `ip` is allowed.
    pub fn is_address_allowed(&self, ip: &IpAddr) -> bool {
        self.network_enabled && !(self.block_private_addresses && Self::is_private_address(ip))
    }

    /// Check if the given address is loopback, private, link-local, or
    /// otherwise not publicly routable.
    ///
    /// Covers cloud metadata endpoints (169.254.169.254) through the
    /// link-local range, and IPv4-mapped IPv6 addresses through their IPv4
    /// form.
    pub fn is_private_address(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_documentation()
                    || v4.is_unspecified()
            }
            IpAddr::V6(v6) => {
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return Self::is_private_address(&IpAddr::V4(v4));
                }
                let first = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (first & 0xfe00) == 0xfc00
                    || (first & 0xffc0) == 0xfe80
            }
        }
    }
}

/// Builder for [`Permissions`].
#[derive(Debug, Default)]
pub struct PermissionsBuilder {
    inner: Permissions,
}

impl PermissionsBuilder {
    /// Allow resolving specific hosts.
    ///
    /// # Arguments
    ///
    /// * `hosts` - Host patterns to allow (e.g., `api.example.com`, `*.example.com`)
    #[must_use]
    pub fn allow_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.network_enabled = true;
        self.inner.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        if self.inner.max_open_sockets == 0 {
            self.inner.max_open_sockets = 64;
        }
        self
    }

    /// Refuse connections to non-public addresses.
    #[must_use]
    pub fn block_private_addresses(mut self) -> Self {
        self.inner.block_private_addresses = true;
        self
    }

    /// Set the maximum number of simultaneously open sockets.
    #[must_use]
    pub fn max_open_sockets(mut self, max: u32) -> Self {
        self.inner.max_open_sockets = max;
        self
    }

    /// Build the permissions.
    #[must_use]
    pub fn build(self) -> Permissions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_permissions_none() {
        let perms = Permissions::none();
        assert!(!perms.network_enabled);
        assert!(perms.allowed_hosts.is_empty());
        assert!(!perms.is_host_allowed("example.com"));
        assert!(!perms.is_address_allowed(&ip("93.184.216.34")));
    }

    #[test]
    fn test_permissions_all() {
        let perms = Permissions::all();
        assert!(perms.is_host_allowed("example.com"));
        assert!(perms.is_address_allowed(&ip("127.0.0.1")));
    }

    #[test]
    fn test_host_allowed_exact_match() {
        let perms = Permissions::builder()
            .allow_hosts(["api.example.com"])
            .build();

        assert!(perms.is_host_allowed("api.example.com"));
        assert!(perms.is_host_allowed("API.Example.com."));
        assert!(!perms.is_host_allowed("other.example.com"));
        assert!(!perms.is_host_allowed("evil.com"));
    }

    #[test]
    fn test_host_allowed_wildcard() {
        let perms = Permissions::builder().allow_hosts(["*.example.com"]).build();

        assert!(perms.is_host_allowed("api.example.com"));
        assert!(perms.is_host_allowed("www.example.com"));
        assert!(perms.is_host_allowed("example.com"));
        assert!(!perms.is_host_allowed("badexample.com"));
        assert!(!perms.is_host_allowed("evil.com"));
    }

    #[test]
    fn test_private_address_ranges() {
        for addr in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
        ] {
            assert!(Permissions::is_private_address(&ip(addr)), "{addr}");
        }
    }

    #[test]
    fn test_public_addresses() {
        for addr in ["93.184.216.34", "8.8.8.8", "2606:4700::1111"] {
            assert!(!Permissions::is_private_address(&ip(addr)), "{addr}");
        }
    }

    #[test]
    fn test_block_private_addresses() {
        let perms = Permissions::builder()
            .allow_hosts(["*"])
            .block_private_addresses()
            .build();

        assert!(!perms.is_address_allowed(&ip("192.168.1.1")));
        assert!(perms.is_address_allowed(&ip("8.8.8.8")));
    }

    #[test]
    fn test_from_config() {
        let config = SocketConfig {
            allowed_hosts: vec!["example.com".into()],
            block_private_addresses: true,
            max_open_sockets: 2,
            ..Default::default()
        };
        let perms = Permissions::from_config(&config);

        assert!(perms.network_enabled);
        assert!(perms.block_private_addresses);
        assert_eq!(perms.max_open_sockets, 2);
        assert!(perms.is_host_allowed("example.com"));
        assert!(!perms.is_host_allowed("python.org"));
    }
}
