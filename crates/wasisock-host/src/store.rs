//! Per-execution guest context and store management.
//!
//! This module provides:
//! - [`GuestContext`]: state reachable from host functions through the store
//! - [`SocketMetrics`]: socket activity counters for one execution
//! - [`create_store`]: a fuel-configured [`Store`] around a context

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;
use wasmtime::Store;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;
use wasisock_common::{ExecutionConfig, RuntimeError};
use wasisock_core::{Descriptor, SocketProvider};

/// Provider shared between the embedder and the guest's socket imports.
pub type SharedProvider = Arc<dyn SocketProvider + Send + Sync>;

/// Per-execution context.
///
/// Holds the WASI preview1 state, the socket provider the guest's
/// `sock_*` imports are served from, and metrics for this execution.
///
/// The guest may only use descriptors it opened through this context.
/// Any it leaves open are closed when the context is dropped.
pub struct GuestContext {
    /// WASI preview1 context.
    wasi: WasiP1Ctx,

    /// Socket provider backing the `sock_*` imports.
    provider: SharedProvider,

    /// Descriptors opened by this guest and not yet closed.
    sockets: HashSet<Descriptor>,

    /// Unique execution identifier for tracing.
    pub execution_id: String,

    /// Socket activity counters.
    pub metrics: SocketMetrics,

    start_time: Instant,
}

/// Socket activity and resource usage for one execution.
#[derive(Debug, Clone, Default)]
pub struct SocketMetrics {
    /// Sockets opened by the guest.
    pub sockets_opened: u64,

    /// Bytes the provider accepted from the guest.
    pub bytes_sent: u64,

    /// Bytes delivered to the guest.
    pub bytes_received: u64,

    /// Fuel consumed during execution.
    pub fuel_consumed: u64,

    /// Total execution duration.
    pub duration: Option<Duration>,
}

impl GuestContext {
    /// Create a context for one execution.
    ///
    /// `args` become the guest's `argv`; stdio is inherited when the
    /// execution config asks for it.
    pub fn new(provider: SharedProvider, config: &ExecutionConfig, args: &[String]) -> Self {
        let mut builder = WasiCtxBuilder::new();
        builder.args(args);
        if config.inherit_stdio {
            builder.inherit_stdio();
        }

        Self {
            wasi: builder.build_p1(),
            provider,
            sockets: HashSet::new(),
            execution_id: Uuid::new_v4().to_string(),
            metrics: SocketMetrics::default(),
            start_time: Instant::now(),
        }
    }

    /// The WASI preview1 context.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// The socket provider.
    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Record a descriptor the guest just opened.
    pub fn track_socket(&mut self, descriptor: Descriptor) {
        self.sockets.insert(descriptor);
    }

    /// Whether the guest opened `descriptor` and has not closed it.
    pub fn owns_socket(&self, descriptor: Descriptor) -> bool {
        self.sockets.contains(&descriptor)
    }

    /// Forget a descriptor the guest is closing. Returns `false` if the guest
    /// did not own it.
    pub fn untrack_socket(&mut self, descriptor: Descriptor) -> bool {
        self.sockets.remove(&descriptor)
    }

    /// Number of descriptors the guest still holds.
    pub fn open_sockets(&self) -> usize {
        self.sockets.len()
    }

    /// Close every descriptor the guest still holds.
    pub fn release_sockets(&mut self) {
        for descriptor in self.sockets.drain() {
            if let Err(e) = self.provider.close(descriptor) {
                debug!(
                    execution_id = %self.execution_id,
                    fd = descriptor.raw(),
                    error = %e,
                    "Failed to release guest socket"
                );
            }
        }
    }

    /// Get elapsed time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finalize metrics after execution.
    pub fn finalize_metrics(&mut self) {
        self.metrics.duration = Some(self.start_time.elapsed());
    }
}

impl Drop for GuestContext {
    fn drop(&mut self) {
        if !self.sockets.is_empty() {
            debug!(
                execution_id = %self.execution_id,
                count = self.sockets.len(),
                "Releasing sockets left open by guest"
            );
            self.release_sockets();
        }
    }
}

impl std::fmt::Debug for GuestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestContext")
            .field("execution_id", &self.execution_id)
            .field("metrics", &self.metrics)
            .field("open_sockets", &self.sockets.len())
            .finish_non_exhaustive()
    }
}

/// Create a new Wasmtime store around `context`.
///
/// With fuel metering enabled the store gets `max_fuel`; otherwise it gets
/// effectively unlimited fuel, since the engine always meters.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    config: &ExecutionConfig,
    context: GuestContext,
) -> Result<Store<GuestContext>, RuntimeError> {
    let mut store = Store::new(engine.inner(), context);

    let fuel = if config.fuel_metering {
        config.max_fuel
    } else {
        u64::MAX
    };
    store
        .set_fuel(fuel)
        .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;

    Ok(store)
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<GuestContext>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Calculate fuel consumed.
pub fn calculate_fuel_consumed(initial_fuel: u64, store: &Store<GuestContext>) -> u64 {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    initial_fuel.saturating_sub(remaining)
}
