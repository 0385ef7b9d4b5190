//! Wasmtime host for socket-using WebAssembly guests.
//!
//! This crate runs core modules that target `wasi_snapshot_preview1` and
//! serves their `sock_*` imports from a [`SocketProvider`](wasisock_core::SocketProvider):
//! - [`WasmEngine`]: configured Wasmtime engine
//! - [`CompiledModule`]: compiled guest module
//! - [`GuestContext`]: per-execution WASI state, provider, and metrics
//! - [`InstanceRunner`]: instantiation and entry point execution
//! - [`linker`]: registration of WASI and the socket imports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  (Shared, thread-safe, fuel metering)                   │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          CompiledModule + InstanceRunner                │
//! │  - preview1 imports from wasmtime-wasi                  │
//! │  - sock_* imports backed by the provider                │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              Store<GuestContext>                        │
//! │  (Per-execution, isolated)                              │
//! │  - WASI ctx, SharedProvider, SocketMetrics              │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod errno;
pub mod instance;
pub mod linker;
pub mod module;
pub mod sockets;
pub mod store;

pub use engine::WasmEngine;
pub use errno::Errno;
pub use instance::{ExecutionResult, InstanceRunner};
pub use module::CompiledModule;
pub use store::{GuestContext, SharedProvider, SocketMetrics, create_store};
