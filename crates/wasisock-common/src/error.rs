//! Error types for wasisock.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`SocketError`]: Failures of the socket adapter, the only errors guest-facing
//!   socket code ever sees
//! - [`RuntimeError`]: Top-level errors for the WebAssembly host
//! - [`HostFunctionError`]: Errors from host function implementations
//! - [`WasiError`]: WASI-related errors

use std::io;

use thiserror::Error;

/// Socket adapter errors.
///
/// Every failure reported by the underlying provider is wrapped into one of
/// these variants with the original [`io::Error`] kept as the source, so the
/// OS-style cause stays available for diagnostics.
#[derive(Error, Debug)]
pub enum SocketError {
    /// The socket has been closed and can no longer be used.
    #[error("Socket is closed")]
    Closed,

    /// `connect` was called on a socket that is already connected.
    #[error("Socket is already connected")]
    AlreadyConnected,

    /// A data transfer was attempted before the socket was connected.
    #[error("Socket is not connected")]
    NotConnected,

    /// The provider could not create a socket.
    #[error("Socket creation failed: {source}")]
    Open {
        /// Provider failure.
        #[source]
        source: io::Error,
    },

    /// Hostname resolution produced no usable address.
    #[error("Cannot resolve hostname: {host}")]
    AddressResolution {
        /// The hostname that failed to resolve.
        host: String,
        /// Resolver failure, absent when the resolver simply returned nothing.
        #[source]
        source: Option<io::Error>,
    },

    /// The provider failed to establish the connection.
    #[error("Connection failed: {source}")]
    Connect {
        /// Provider failure.
        #[source]
        source: io::Error,
    },

    /// The provider failed to send data.
    #[error("Send failed: {source}")]
    Send {
        /// Provider failure.
        #[source]
        source: io::Error,
    },

    /// The provider failed to receive data.
    #[error("Receive failed: {source}")]
    Recv {
        /// Provider failure.
        #[source]
        source: io::Error,
    },

    /// The peer stopped accepting data while a payload was still pending.
    #[error("Connection closed during send ({sent} of {total} bytes written)")]
    ConnectionClosedDuringSend {
        /// Bytes written before the provider reported zero progress.
        sent: usize,
        /// Total payload length.
        total: usize,
    },

    /// Reserved for interface compatibility; the blocking provider has no
    /// deadline mechanism, so the adapter never produces it.
    #[error("Socket operation timed out")]
    Timeout,
}

impl SocketError {
    /// Create a new `AddressResolution` error for a resolver that returned nothing.
    pub fn unresolved(host: impl Into<String>) -> Self {
        Self::AddressResolution {
            host: host.into(),
            source: None,
        }
    }

    /// Create a new `AddressResolution` error wrapping a resolver failure.
    pub fn resolution_failed(host: impl Into<String>, source: io::Error) -> Self {
        Self::AddressResolution {
            host: host.into(),
            source: Some(source),
        }
    }

    /// Returns `true` if this error came from hostname resolution.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::AddressResolution { .. })
    }

    /// Returns `true` if this is the (reserved) timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this error is a lifecycle violation rather than a
    /// provider failure.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::AlreadyConnected | Self::NotConnected
        )
    }

    /// The provider's underlying cause, if this error wraps one.
    pub fn provider_error(&self) -> Option<&io::Error> {
        match self {
            Self::Open { source }
            | Self::Connect { source }
            | Self::Send { source }
            | Self::Recv { source } => Some(source),
            Self::AddressResolution { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// The OS error code of the wrapped provider failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.provider_error().and_then(io::Error::raw_os_error)
    }
}

/// Top-level runtime errors.
///
/// These errors represent failures that can occur while compiling and
/// executing a guest module that uses the socket imports.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The requested export was not found in the guest module.
    #[error("Entry point not found: {name}")]
    EntryPointNotFound {
        /// The export name that was looked up.
        name: String,
    },

    /// WebAssembly compilation or instantiation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// A host function returned an error.
    #[error("Host function error: {0}")]
    HostFunction(#[from] HostFunctionError),

    /// WASI operation failed.
    #[error("WASI error: {0}")]
    Wasi(#[from] WasiError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A WebAssembly trap occurred during execution.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Errors from host function implementations.
///
/// Socket host functions report these to the guest as WASI errno values;
/// the typed form exists for logging and for tests.
#[derive(Error, Debug)]
pub enum HostFunctionError {
    /// The requested operation was denied by the permission system.
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// Description of the resource that access was denied to.
        resource: String,
    },

    /// Invalid argument was passed to a host function.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },

    /// A guest pointer/length pair fell outside linear memory.
    #[error("Memory access out of bounds: ptr={ptr} len={len}")]
    MemoryOutOfBounds {
        /// Guest pointer.
        ptr: i64,
        /// Length of the access in bytes.
        len: i64,
    },

    /// The guest module does not export a `memory`.
    #[error("Guest memory export not found")]
    MemoryNotExported,
}

/// WASI-related errors.
#[derive(Error, Debug)]
pub enum WasiError {
    /// Failed to initialize the WASI context or link its imports.
    #[error("WASI initialization failed: {reason}")]
    InitializationFailed {
        /// Description of the initialization failure.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `EntryPointNotFound` error.
    pub fn entry_point_not_found(name: impl Into<String>) -> Self {
        Self::EntryPointNotFound { name: name.into() }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates a resource limit was exceeded.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::FuelExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_error_display() {
        assert_eq!(SocketError::Closed.to_string(), "Socket is closed");
        assert_eq!(
            SocketError::AlreadyConnected.to_string(),
            "Socket is already connected"
        );
        assert_eq!(
            SocketError::unresolved("nowhere.invalid").to_string(),
            "Cannot resolve hostname: nowhere.invalid"
        );

        let err = SocketError::ConnectionClosedDuringSend { sent: 3, total: 10 };
        assert_eq!(
            err.to_string(),
            "Connection closed during send (3 of 10 bytes written)"
        );
    }

    #[test]
    fn test_socket_error_keeps_cause() {
        let cause = io::Error::from_raw_os_error(111);
        let err = SocketError::Connect { source: cause };

        assert_eq!(err.raw_os_error(), Some(111));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_state_error());
    }

    #[test]
    fn test_resolution_error_source() {
        let err = SocketError::unresolved("host");
        assert!(err.is_resolution());
        assert!(std::error::Error::source(&err).is_none());

        let err = SocketError::resolution_failed(
            "host",
            io::Error::new(io::ErrorKind::NotFound, "no such host"),
        );
        assert!(err.is_resolution());
        assert!(err.provider_error().is_some());
    }

    #[test]
    fn test_state_errors() {
        assert!(SocketError::Closed.is_state_error());
        assert!(SocketError::NotConnected.is_state_error());
        assert!(SocketError::AlreadyConnected.is_state_error());
        assert!(SocketError::Timeout.is_timeout());
        assert_eq!(SocketError::Closed.raw_os_error(), None);
    }

    #[test]
    fn test_error_from_host_function() {
        let host_err = HostFunctionError::PermissionDenied {
            resource: "socket connect".into(),
        };
        let runtime_err: RuntimeError = host_err.into();

        assert!(matches!(runtime_err, RuntimeError::HostFunction(_)));
    }

    #[test]
    fn test_is_resource_limit() {
        assert!(RuntimeError::FuelExhausted.is_resource_limit());
        assert!(!RuntimeError::entry_point_not_found("_start").is_resource_limit());
    }
}
