//! Permission-enforcing provider decorator.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use tracing::warn;

use crate::permissions::Permissions;
use crate::provider::{AddressFamily, CandidateAddress, Descriptor, SocketKind, SocketProvider};

/// Wraps a provider and checks [`Permissions`] before delegating.
///
/// - `open` fails once `max_open_sockets` descriptors are live
/// - `resolve` fails for hosts outside the allow-list
/// - `connect` fails for blocked addresses, so IP literals cannot bypass the
///   host check when private addresses are blocked
///
/// Denials surface as [`io::ErrorKind::PermissionDenied`].
#[derive(Debug)]
pub struct GuardedProvider<P> {
    inner: P,
    permissions: Permissions,
    live: DashSet<Descriptor>,
    /// Open slots in use, including opens still in flight.
    reserved: AtomicUsize,
}

impl<P: SocketProvider> GuardedProvider<P> {
    /// Guard `inner` with `permissions`.
    pub fn new(inner: P, permissions: Permissions) -> Self {
        Self {
            inner,
            permissions,
            live: DashSet::new(),
            reserved: AtomicUsize::new(0),
        }
    }

    /// The permissions being enforced.
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of descriptors opened through this guard and not yet closed.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

fn denied(what: String) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, what)
}

impl<P: SocketProvider> SocketProvider for GuardedProvider<P> {
    fn open(&self, family: AddressFamily, kind: SocketKind) -> io::Result<Descriptor> {
        if !self.permissions.network_enabled {
            warn!("Socket open blocked: network access disabled");
            return Err(denied("network access is disabled".into()));
        }

        let max = self.permissions.max_open_sockets as usize;
        if self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_err()
        {
            warn!(max, "Socket open blocked: too many open sockets");
            return Err(denied(format!("at most {max} sockets may be open")));
        }

        match self.inner.open(family, kind) {
            Ok(descriptor) => {
                self.live.insert(descriptor);
                Ok(descriptor)
            }
            Err(e) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<CandidateAddress>> {
        if !self.permissions.is_host_allowed(host) {
            warn!(host, "Resolve blocked: not in allowed hosts");
            return Err(denied(format!("host '{host}' is not allowed")));
        }
        self.inner.resolve(host, port)
    }

    fn connect(&self, descriptor: Descriptor, address: &CandidateAddress) -> io::Result<()> {
        if !self.permissions.is_address_allowed(&address.ip()) {
            warn!(fd = descriptor.raw(), address = %address, "Connect blocked: private address");
            return Err(denied(format!("address {address} is not allowed")));
        }
        self.inner.connect(descriptor, address)
    }

    fn send(&self, descriptor: Descriptor, data: &[u8]) -> io::Result<usize> {
        self.inner.send(descriptor, data)
    }

    fn recv(&self, descriptor: Descriptor, max_bytes: usize) -> io::Result<Vec<u8>> {
        self.inner.recv(descriptor, max_bytes)
    }

    fn close(&self, descriptor: Descriptor) -> io::Result<()> {
        if self.live.remove(&descriptor).is_some() {
            self.reserved.fetch_sub(1, Ordering::AcqRel);
        }
        self.inner.close(descriptor)
    }
}
