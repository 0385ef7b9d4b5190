//! Constants and inert knobs kept for callers written against a richer
//! socket interface.
//!
//! Socket options and timeouts are accepted and stored so such callers keep
//! working; none of them changes how the blocking provider behaves.

use std::time::Duration;

use parking_lot::RwLock;

use crate::provider::{AddressFamily, CandidateAddress, SocketKind, SocketProvider};
use wasisock_common::SocketError;

/// IPv4 address family.
pub const AF_INET: i32 = AddressFamily::Inet.as_i32();
/// IPv6 address family.
pub const AF_INET6: i32 = AddressFamily::Inet6.as_i32();
/// Stream socket type.
pub const SOCK_STREAM: i32 = SocketKind::Stream.as_i32();
/// Datagram socket type.
pub const SOCK_DGRAM: i32 = SocketKind::Datagram.as_i32();

/// Socket-level option namespace.
pub const SOL_SOCKET: i32 = 1;
/// Address reuse option. Inert.
pub const SO_REUSEADDR: i32 = 2;
/// Keep-alive option. Inert.
pub const SO_KEEPALIVE: i32 = 9;
/// TCP protocol level.
pub const IPPROTO_TCP: i32 = 6;
/// Nagle toggle. Inert.
pub const TCP_NODELAY: i32 = 1;

/// IPv6 is not resolved or connected reliably by the bundled providers.
pub const HAS_IPV6: bool = false;

static DEFAULT_TIMEOUT: RwLock<Option<Duration>> = parking_lot::const_rwlock(None);

/// The nominal timeout new sockets start with.
pub fn default_timeout() -> Option<Duration> {
    *DEFAULT_TIMEOUT.read()
}

/// Set the nominal timeout new sockets start with.
///
/// Expected to be called once at startup. The value is stored and reported
/// back, never enforced.
pub fn set_default_timeout(timeout: Option<Duration>) {
    *DEFAULT_TIMEOUT.write() = timeout;
}

/// Resolve `host` through the provider.
///
/// Unlike [`Socket::connect`](crate::Socket::connect), an empty result is
/// returned as-is rather than turned into an error.
pub fn getaddrinfo<P: SocketProvider + ?Sized>(
    provider: &P,
    host: &str,
    port: u16,
) -> Result<Vec<CandidateAddress>, SocketError> {
    provider
        .resolve(host, port)
        .map_err(|e| SocketError::resolution_failed(host, e))
}
