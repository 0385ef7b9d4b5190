//! Blocking socket adapter over a pluggable socket provider.
//!
//! This crate layers a lifecycle-checked, standard-shaped socket API over a
//! small set of primitive blocking operations:
//! - [`SocketProvider`]: the primitives (open, resolve, connect, send, recv, close)
//! - [`Socket`]: the adapter with its `Open → Connected → Closed` state machine
//! - [`create_connection`] / [`with_connection`]: scoped acquisition helpers
//! - [`StdProvider`]: primitives backed by `std::net`
//! - [`GuardedProvider`]: primitives filtered through [`Permissions`]
//! - [`addr`]: the fixed-size address record shared with WebAssembly guests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Socket<P> / create_connection / with_connection        │
//! │  - state checks, error wrapping, send_all loop          │
//! └─────────────────────────────────────────────────────────┘
//!                            │  P: SocketProvider
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  GuardedProvider<P>  (optional)                         │
//! │  - host allow-list, private address blocking            │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  StdProvider  or any other SocketProvider               │
//! │  - descriptor table, blocking TCP                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Higher-level clients take the provider as a value rather than relying on
//! a process-wide socket implementation.

pub mod addr;
pub mod compat;
pub mod connection;
pub mod guard;
pub mod permissions;
pub mod provider;
pub mod socket;
pub mod std_provider;

pub use connection::{create_connection, create_connection_with, with_connection};
pub use guard::GuardedProvider;
pub use permissions::Permissions;
pub use provider::{AddressFamily, CandidateAddress, Descriptor, SocketKind, SocketProvider};
pub use socket::{ConnectPolicy, DEFAULT_RECV_SIZE, Socket, SocketState};
pub use std_provider::StdProvider;
pub use wasisock_common::SocketError;
