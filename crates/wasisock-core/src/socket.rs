//! Lifecycle-checked socket over a [`SocketProvider`].
//!
//! A [`Socket`] moves through three states:
//!
//! ```text
//! Open --connect--> Connected --close--> Closed
//!   \_____________________close_______/
//! ```
//!
//! Nothing leaves `Closed`. Every operation checks the state before touching
//! the provider, and every provider failure comes back as a [`SocketError`]
//! with the original cause attached.

use std::fmt;
use std::net::Shutdown;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::compat;
use crate::provider::{AddressFamily, CandidateAddress, Descriptor, SocketKind, SocketProvider};
use wasisock_common::{SocketConfig, SocketError};

/// Default `recv` size.
pub const DEFAULT_RECV_SIZE: usize = 4096;

/// Lifecycle state of a [`Socket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Descriptor acquired, not connected.
    Open,
    /// Connected to a peer.
    Connected,
    /// Descriptor released. Terminal.
    Closed,
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketState::Open => write!(f, "disconnected"),
            SocketState::Connected => write!(f, "connected"),
            SocketState::Closed => write!(f, "closed"),
        }
    }
}

/// Which resolved candidates `connect` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectPolicy {
    /// Connect to the first candidate only; a failure is reported as-is.
    #[default]
    FirstCandidate,
    /// Try candidates in resolver order until one succeeds. Changes behaviour
    /// for callers that expect a single attempt.
    AllCandidates,
}

impl From<&SocketConfig> for ConnectPolicy {
    fn from(config: &SocketConfig) -> Self {
        if config.try_all_candidates {
            ConnectPolicy::AllCandidates
        } else {
            ConnectPolicy::FirstCandidate
        }
    }
}

/// A blocking socket bound to one provider descriptor.
///
/// Dropping the socket closes it. Callers should still call
/// [`close`](Self::close) explicitly when they are done.
pub struct Socket<P: SocketProvider> {
    provider: P,
    family: AddressFamily,
    kind: SocketKind,
    descriptor: Option<Descriptor>,
    state: SocketState,
    policy: ConnectPolicy,
    timeout: Option<Duration>,
}

impl<P: SocketProvider> Socket<P> {
    /// Open a socket of the given family and kind.
    pub fn open(provider: P, family: AddressFamily, kind: SocketKind) -> Result<Self, SocketError> {
        let descriptor = provider
            .open(family, kind)
            .map_err(|source| SocketError::Open { source })?;

        debug!(fd = descriptor.raw(), %family, %kind, "Socket opened");

        Ok(Self {
            provider,
            family,
            kind,
            descriptor: Some(descriptor),
            state: SocketState::Open,
            policy: ConnectPolicy::default(),
            timeout: compat::default_timeout(),
        })
    }

    /// Open an IPv4 stream socket.
    pub fn stream(provider: P) -> Result<Self, SocketError> {
        Self::open(provider, AddressFamily::Inet, SocketKind::Stream)
    }

    /// Set the candidate selection policy used by [`connect`](Self::connect).
    #[must_use]
    pub fn with_policy(mut self, policy: ConnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve `host` and connect to it.
    ///
    /// The socket must be open and not yet connected. An empty resolution
    /// leaves the socket open. With [`ConnectPolicy::FirstCandidate`] only the
    /// first resolved address is tried.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), SocketError> {
        let descriptor = match (self.state, self.descriptor) {
            (SocketState::Open, Some(descriptor)) => descriptor,
            (SocketState::Connected, _) => return Err(SocketError::AlreadyConnected),
            _ => return Err(SocketError::Closed),
        };

        let candidates = self
            .provider
            .resolve(host, port)
            .map_err(|e| SocketError::resolution_failed(host, e))?;

        let Some((first, rest)) = candidates.split_first() else {
            warn!(fd = descriptor.raw(), host, "Hostname resolved to no addresses");
            return Err(SocketError::unresolved(host));
        };

        let connected_to = match self.policy {
            ConnectPolicy::FirstCandidate => {
                self.provider
                    .connect(descriptor, first)
                    .map_err(|source| SocketError::Connect { source })?;
                *first
            }
            ConnectPolicy::AllCandidates => self.connect_any(descriptor, first, rest)?,
        };

        self.state = SocketState::Connected;
        debug!(
            fd = descriptor.raw(),
            host,
            address = %connected_to,
            candidates = candidates.len(),
            "Socket connected"
        );
        Ok(())
    }

    /// Try `first`, then each of `rest`, reporting the last failure.
    fn connect_any(
        &self,
        descriptor: Descriptor,
        first: &CandidateAddress,
        rest: &[CandidateAddress],
    ) -> Result<CandidateAddress, SocketError> {
        let mut last_error = match self.provider.connect(descriptor, first) {
            Ok(()) => return Ok(*first),
            Err(e) => e,
        };
        debug!(fd = descriptor.raw(), address = %first, error = %last_error, "Candidate failed");

        for candidate in rest {
            match self.provider.connect(descriptor, candidate) {
                Ok(()) => return Ok(*candidate),
                Err(e) => {
                    debug!(fd = descriptor.raw(), address = %candidate, error = %e, "Candidate failed");
                    last_error = e;
                }
            }
        }
        Err(SocketError::Connect { source: last_error })
    }

    /// Like [`connect`](Self::connect), but report failure as an errno-style
    /// code (0 on success, 1 when no OS code is available).
    pub fn connect_ex(&mut self, host: &str, port: u16) -> i32 {
        match self.connect(host, port) {
            Ok(()) => 0,
            Err(e) => e.raw_os_error().unwrap_or(1),
        }
    }

    /// Send a prefix of `data`, returning how many bytes the provider wrote.
    ///
    /// Partial writes are normal; use [`send_all`](Self::send_all) to write
    /// the whole payload.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, SocketError> {
        let descriptor = self.connected_descriptor()?;
        let written = self
            .provider
            .send(descriptor, data)
            .map_err(|source| SocketError::Send { source })?
            .min(data.len());

        trace!(fd = descriptor.raw(), requested = data.len(), written, "send");
        Ok(written)
    }

    /// Send the entire payload.
    ///
    /// A zero-byte write while data remains means the peer stopped reading;
    /// that is reported as [`SocketError::ConnectionClosedDuringSend`] instead
    /// of being retried.
    pub fn send_all(&mut self, data: &[u8]) -> Result<(), SocketError> {
        self.connected_descriptor()?;

        let mut sent = 0;
        while sent < data.len() {
            let written = self.send(&data[sent..])?;
            if written == 0 {
                return Err(SocketError::ConnectionClosedDuringSend {
                    sent,
                    total: data.len(),
                });
            }
            sent += written;
        }
        Ok(())
    }

    /// Receive at most `max_bytes`.
    ///
    /// An empty result means the peer closed the connection.
    pub fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, SocketError> {
        let descriptor = self.connected_descriptor()?;
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let mut data = self
            .provider
            .recv(descriptor, max_bytes)
            .map_err(|source| SocketError::Recv { source })?;
        data.truncate(max_bytes);

        trace!(fd = descriptor.raw(), max_bytes, received = data.len(), "recv");
        Ok(data)
    }

    /// Receive at most [`DEFAULT_RECV_SIZE`] bytes.
    pub fn recv_default(&mut self) -> Result<Vec<u8>, SocketError> {
        self.recv(DEFAULT_RECV_SIZE)
    }

    /// Receive into `buf`, returning the number of bytes stored.
    pub fn recv_into(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        let data = self.recv(buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Close the socket.
    ///
    /// Idempotent and infallible: provider errors during release are logged
    /// and dropped, and the socket ends up `Closed` regardless.
    pub fn close(&mut self) {
        if let Some(descriptor) = self.descriptor.take() {
            match self.provider.close(descriptor) {
                Ok(()) => debug!(fd = descriptor.raw(), "Socket closed"),
                Err(e) => debug!(fd = descriptor.raw(), error = %e, "Ignoring error on close"),
            }
        }
        self.state = SocketState::Closed;
    }

    /// The provider descriptor, or [`SocketError::Closed`].
    pub fn fileno(&self) -> Result<Descriptor, SocketError> {
        self.descriptor.ok_or(SocketError::Closed)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Returns `true` once `connect` has succeeded and until `close`.
    pub fn is_connected(&self) -> bool {
        self.state == SocketState::Connected
    }

    /// Returns `true` after `close`.
    pub fn is_closed(&self) -> bool {
        self.state == SocketState::Closed
    }

    /// Address family the socket was opened with.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Socket type the socket was opened with.
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Candidate selection policy.
    pub fn policy(&self) -> ConnectPolicy {
        self.policy
    }

    /// The provider backing this socket.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Nominal timeout. Stored, never enforced.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the nominal timeout. Every operation still blocks until the
    /// provider returns.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Accepted for compatibility; the socket is always blocking.
    #[allow(clippy::unused_self)]
    pub fn set_blocking(&mut self, _blocking: bool) {}

    /// Accepted for compatibility; options have no effect.
    #[allow(clippy::unused_self)]
    pub fn set_option(&mut self, _level: i32, _name: i32, _value: i32) -> Result<(), SocketError> {
        Ok(())
    }

    /// Accepted for compatibility; always reports 0.
    #[allow(clippy::unused_self)]
    pub fn option(&self, _level: i32, _name: i32) -> i32 {
        0
    }

    /// Accepted for compatibility; the provider has no half-close.
    #[allow(clippy::unused_self)]
    pub fn shutdown(&mut self, _how: Shutdown) {}

    fn connected_descriptor(&self) -> Result<Descriptor, SocketError> {
        match (self.state, self.descriptor) {
            (SocketState::Connected, Some(descriptor)) => Ok(descriptor),
            (SocketState::Open, Some(_)) => Err(SocketError::NotConnected),
            _ => Err(SocketError::Closed),
        }
    }
}

impl<P: SocketProvider> Drop for Socket<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: SocketProvider> fmt::Display for Socket<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.descriptor {
            Some(fd) => write!(
                f,
                "<Socket fd={fd} family={} type={} {}>",
                self.family, self.kind, self.state
            ),
            None => write!(
                f,
                "<Socket fd=None family={} type={} {}>",
                self.family, self.kind, self.state
            ),
        }
    }
}

impl<P: SocketProvider> fmt::Debug for Socket<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("descriptor", &self.descriptor)
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
