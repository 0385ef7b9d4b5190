//! Configuration structures for wasisock.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings
//! - [`ExecutionConfig`]: Per-execution limits and WASI setup
//! - [`SocketConfig`]: Socket adapter, provider, and permission settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Socket layer configuration.
    #[serde(default)]
    pub sockets: SocketConfig,
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable the pooling allocator.
    ///
    /// Off by default: the CLI runs one guest at a time, and interpreter
    /// guests need more linear memory than a pool slot usually reserves.
    #[serde(default)]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: false,
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
        }
    }
}

/// Per-execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum fuel (CPU instructions) per execution.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Enable fuel metering.
    #[serde(default)]
    pub fuel_metering: bool,

    /// Name of the exported function to call.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,

    /// Forward the guest's stdout/stderr to the host process.
    #[serde(default = "defaults::inherit_stdio")]
    pub inherit_stdio: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            fuel_metering: false,
            entry_point: defaults::entry_point(),
            inherit_stdio: defaults::inherit_stdio(),
        }
    }
}

/// Socket adapter and provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocketConfig {
    /// Default `recv` size when the caller does not pass one.
    #[serde(default = "defaults::recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Maximum number of candidate addresses a resolve returns.
    #[serde(default = "defaults::max_resolve_addrs")]
    pub max_resolve_addrs: usize,

    /// Try every resolved candidate instead of only the first one.
    ///
    /// This changes the connect behaviour guests were written against, so it
    /// stays off unless asked for.
    #[serde(default)]
    pub try_all_candidates: bool,

    /// Nominal default timeout in milliseconds. Stored, never enforced.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Allow guests to open sockets at all.
    #[serde(default = "defaults::network_enabled")]
    pub network_enabled: bool,

    /// Hostname patterns guests may resolve (`host`, `*.suffix`, `*`).
    #[serde(default = "defaults::allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Refuse connections to loopback, private, and link-local addresses.
    #[serde(default)]
    pub block_private_addresses: bool,

    /// Maximum simultaneously open sockets per provider.
    #[serde(default = "defaults::max_open_sockets")]
    pub max_open_sockets: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: defaults::recv_buffer_size(),
            max_resolve_addrs: defaults::max_resolve_addrs(),
            try_all_candidates: false,
            default_timeout_ms: None,
            network_enabled: defaults::network_enabled(),
            allowed_hosts: defaults::allowed_hosts(),
            block_private_addresses: false,
            max_open_sockets: defaults::max_open_sockets(),
        }
    }
}

impl SocketConfig {
    /// Get the nominal default timeout as a `Duration`.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn max_instances() -> u32 {
        16
    }

    pub const fn instance_memory_mb() -> u32 {
        256
    }

    pub const fn max_fuel() -> u64 {
        10_000_000_000
    }

    pub fn entry_point() -> String {
        "_start".to_string()
    }

    pub const fn inherit_stdio() -> bool {
        true
    }

    pub const fn recv_buffer_size() -> usize {
        4096
    }

    pub const fn max_resolve_addrs() -> usize {
        10
    }

    pub const fn network_enabled() -> bool {
        true
    }

    pub fn allowed_hosts() -> Vec<String> {
        vec!["*".to_string()]
    }

    pub const fn max_open_sockets() -> u32 {
        64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert!(!config.engine.pooling_allocator);
        assert_eq!(config.engine.max_instances, 16);
        assert_eq!(config.engine.instance_memory_mb, 256);

        assert!(!config.execution.fuel_metering);
        assert_eq!(config.execution.entry_point, "_start");
        assert!(config.execution.inherit_stdio);

        assert_eq!(config.sockets.recv_buffer_size, 4096);
        assert_eq!(config.sockets.max_resolve_addrs, 10);
        assert!(!config.sockets.try_all_candidates);
        assert!(config.sockets.network_enabled);
        assert_eq!(config.sockets.allowed_hosts, vec!["*".to_string()]);
        assert!(!config.sockets.block_private_addresses);
        assert_eq!(config.sockets.max_open_sockets, 64);
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.engine.max_instances,
            deserialized.engine.max_instances
        );
        assert_eq!(
            config.sockets.max_resolve_addrs,
            deserialized.sockets.max_resolve_addrs
        );
    }

    #[test]
    fn test_default_timeout() {
        let config = SocketConfig {
            default_timeout_ms: Some(1500),
            ..Default::default()
        };
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(SocketConfig::default().default_timeout(), None);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"sockets": {"allowed_hosts": ["example.com"]}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.sockets.allowed_hosts, vec!["example.com".to_string()]);
        assert_eq!(config.sockets.recv_buffer_size, 4096);
        assert_eq!(config.execution.entry_point, "_start");
    }
}
