//! A [`SocketProvider`] backed by the host's TCP stack.
//!
//! Descriptors index a shared table of [`std::net::TcpStream`]s. The table is
//! a [`DashMap`], so one provider can be shared through an `Arc` by any
//! number of sockets; blocking calls never hold a table lock.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::addr::MAX_RESOLVE_ADDRS;
use crate::provider::{AddressFamily, CandidateAddress, Descriptor, SocketKind, SocketProvider};
use wasisock_common::SocketConfig;

/// First descriptor handed out; 0-2 look like stdio to guests.
const FIRST_DESCRIPTOR: i32 = 3;

enum Slot {
    Pending { family: AddressFamily },
    Connected(Arc<TcpStream>),
}

/// Blocking TCP provider over `std::net`.
pub struct StdProvider {
    slots: DashMap<i32, Slot>,
    next_descriptor: AtomicI32,
    max_resolve_addrs: usize,
}

impl StdProvider {
    /// Create a provider with the default resolve limit.
    pub fn new() -> Self {
        Self::with_max_resolve_addrs(MAX_RESOLVE_ADDRS)
    }

    /// Create a provider that returns at most `max` candidates per resolve.
    pub fn with_max_resolve_addrs(max: usize) -> Self {
        Self {
            slots: DashMap::new(),
            next_descriptor: AtomicI32::new(FIRST_DESCRIPTOR),
            max_resolve_addrs: max,
        }
    }

    /// Create a provider from socket configuration.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self::with_max_resolve_addrs(config.max_resolve_addrs)
    }

    /// Number of descriptors currently held.
    pub fn open_count(&self) -> usize {
        self.slots.len()
    }

    fn stream(&self, descriptor: Descriptor) -> io::Result<Arc<TcpStream>> {
        match self.slots.get(&descriptor.raw()).as_deref() {
            Some(Slot::Connected(stream)) => Ok(Arc::clone(stream)),
            Some(Slot::Pending { .. }) => Err(io::ErrorKind::NotConnected.into()),
            None => Err(bad_descriptor(descriptor)),
        }
    }
}

impl Default for StdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StdProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdProvider")
            .field("open", &self.slots.len())
            .field("max_resolve_addrs", &self.max_resolve_addrs)
            .finish_non_exhaustive()
    }
}

fn bad_descriptor(descriptor: Descriptor) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("unknown socket descriptor {descriptor}"),
    )
}

impl SocketProvider for StdProvider {
    fn open(&self, family: AddressFamily, kind: SocketKind) -> io::Result<Descriptor> {
        if kind != SocketKind::Stream {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{kind} sockets are not supported"),
            ));
        }

        let raw = self.next_descriptor.fetch_add(1, Ordering::Relaxed);
        self.slots.insert(raw, Slot::Pending { family });
        trace!(fd = raw, %family, "Descriptor allocated");
        Ok(Descriptor::new(raw))
    }

    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<CandidateAddress>> {
        let candidates: Vec<CandidateAddress> = (host, port)
            .to_socket_addrs()?
            .map(CandidateAddress::from)
            .take(self.max_resolve_addrs)
            .collect();

        debug!(host, port, count = candidates.len(), "Resolved hostname");
        Ok(candidates)
    }

    fn connect(&self, descriptor: Descriptor, address: &CandidateAddress) -> io::Result<()> {
        let family = match self.slots.get(&descriptor.raw()).as_deref() {
            Some(Slot::Pending { family }) => *family,
            Some(Slot::Connected(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "socket is already connected",
                ));
            }
            None => return Err(bad_descriptor(descriptor)),
        };

        if family != address.family() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} address on {family} socket", address.family()),
            ));
        }

        let stream = TcpStream::connect(address.socket_addr())?;

        match self.slots.get_mut(&descriptor.raw()) {
            Some(mut slot) => {
                *slot = Slot::Connected(Arc::new(stream));
                Ok(())
            }
            // closed while the connect was in flight
            None => Err(bad_descriptor(descriptor)),
        }
    }

    fn send(&self, descriptor: Descriptor, data: &[u8]) -> io::Result<usize> {
        let stream = self.stream(descriptor)?;
        (&*stream).write(data)
    }

    fn recv(&self, descriptor: Descriptor, max_bytes: usize) -> io::Result<Vec<u8>> {
        if max_bytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "recv size must be positive",
            ));
        }

        let stream = self.stream(descriptor)?;
        let mut buf = vec![0u8; max_bytes];
        let n = (&*stream).read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn close(&self, descriptor: Descriptor) -> io::Result<()> {
        match self.slots.remove(&descriptor.raw()) {
            Some((_, Slot::Connected(stream))) => {
                // the peer may already be gone; the descriptor is released either way
                let _ = stream.shutdown(Shutdown::Both);
                trace!(fd = descriptor.raw(), "Connected descriptor released");
                Ok(())
            }
            Some((_, Slot::Pending { .. })) => Ok(()),
            None => Err(bad_descriptor(descriptor)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_are_not_reused() {
        let provider = StdProvider::new();

        let a = provider.open(AddressFamily::Inet, SocketKind::Stream).unwrap();
        provider.close(a).unwrap();
        let b = provider.open(AddressFamily::Inet, SocketKind::Stream).unwrap();

        assert_eq!(a.raw(), FIRST_DESCRIPTOR);
        assert!(b.raw() > a.raw());
        assert_eq!(provider.open_count(), 1);
    }

    #[test]
    fn test_datagram_unsupported() {
        let provider = StdProvider::new();
        let err = provider
            .open(AddressFamily::Inet, SocketKind::Datagram)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_unknown_descriptor() {
        let provider = StdProvider::new();
        let fd = Descriptor::new(99);

        assert_eq!(provider.close(fd).unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(
            provider.send(fd, b"x").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_send_before_connect() {
        let provider = StdProvider::new();
        let fd = provider.open(AddressFamily::Inet, SocketKind::Stream).unwrap();

        assert_eq!(
            provider.send(fd, b"x").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert_eq!(
            provider.recv(fd, 0).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_resolve_ip_literal() {
        let provider = StdProvider::with_max_resolve_addrs(1);
        let addrs = provider.resolve("127.0.0.1", 8080).unwrap();

        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].family(), AddressFamily::Inet);
        assert_eq!(addrs[0].port(), 8080);
    }
}
