//! Scoped connection helpers.

use std::time::Duration;

use tracing::debug;

use crate::provider::SocketProvider;
use crate::socket::{ConnectPolicy, Socket};
use wasisock_common::SocketError;

/// Open an IPv4 stream socket and connect it to `(host, port)`.
///
/// If the connect fails, the half-built socket is closed before the error
/// is returned, so no descriptor leaks. `timeout` is recorded on the socket
/// but not enforced; the provider always blocks.
pub fn create_connection<P: SocketProvider>(
    provider: P,
    address: (&str, u16),
    timeout: Option<Duration>,
) -> Result<Socket<P>, SocketError> {
    create_connection_with(provider, address, timeout, ConnectPolicy::FirstCandidate)
}

/// [`create_connection`] with an explicit candidate selection policy.
pub fn create_connection_with<P: SocketProvider>(
    provider: P,
    (host, port): (&str, u16),
    timeout: Option<Duration>,
    policy: ConnectPolicy,
) -> Result<Socket<P>, SocketError> {
    let mut socket = Socket::stream(provider)?.with_policy(policy);
    if timeout.is_some() {
        socket.set_timeout(timeout);
    }

    if let Err(e) = socket.connect(host, port) {
        debug!(host, port, error = %e, "Connect failed, releasing socket");
        socket.close();
        return Err(e);
    }

    Ok(socket)
}

/// Connect, run `f` with the socket, and close the socket on every exit path.
///
/// The socket is closed after `f` returns, whether it returned `Ok` or
/// `Err`. Errors from connecting are converted into `E`.
pub fn with_connection<P, T, E, F>(
    provider: P,
    address: (&str, u16),
    timeout: Option<Duration>,
    f: F,
) -> Result<T, E>
where
    P: SocketProvider,
    E: From<SocketError>,
    F: FnOnce(&mut Socket<P>) -> Result<T, E>,
{
    let mut socket = create_connection(provider, address, timeout)?;
    let result = f(&mut socket);
    socket.close();
    result
}
