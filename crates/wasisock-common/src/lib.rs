//! Common types, errors, and configuration for wasisock.
//!
//! This crate provides shared functionality used across the wasisock workspace:
//! - Error types using `thiserror`, including the socket error taxonomy
//! - Configuration structures for the host runtime and the socket layer
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, RuntimeConfig, SocketConfig};
pub use config_file::{ConfigFile, ConfigFileError, LoggingConfig};
pub use error::{HostFunctionError, RuntimeError, SocketError, WasiError};
