//! The primitive blocking-socket interface the adapter is layered over.
//!
//! A [`SocketProvider`] owns the actual transport resources and hands out
//! opaque [`Descriptor`]s. Every primitive blocks until it completes and
//! reports failure as an [`io::Error`] carrying an OS-style cause.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

/// Address family of a socket or candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4 (`AF_INET`).
    Inet,
    /// IPv6 (`AF_INET6`). Defined for completeness; resolution is not
    /// guaranteed to produce or connect IPv6 candidates.
    Inet6,
}

impl AddressFamily {
    /// The numeric constant used on the guest ABI.
    pub const fn as_i32(self) -> i32 {
        match self {
            AddressFamily::Inet => 2,
            AddressFamily::Inet6 => 10,
        }
    }

    /// Parse the numeric constant used on the guest ABI.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            2 => Some(AddressFamily::Inet),
            10 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    /// The family an IP address belongs to.
    pub const fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Length of a raw address of this family in bytes.
    pub const fn address_len(self) -> usize {
        match self {
            AddressFamily::Inet => 4,
            AddressFamily::Inet6 => 16,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Inet => write!(f, "AF_INET"),
            AddressFamily::Inet6 => write!(f, "AF_INET6"),
        }
    }
}

/// Socket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Connection-oriented byte stream (`SOCK_STREAM`).
    Stream,
    /// Datagram socket (`SOCK_DGRAM`). Accepted by the type system, not by
    /// the bundled providers.
    Datagram,
}

impl SocketKind {
    /// The numeric constant used on the guest ABI.
    pub const fn as_i32(self) -> i32 {
        match self {
            SocketKind::Stream => 1,
            SocketKind::Datagram => 2,
        }
    }

    /// Parse the numeric constant used on the guest ABI.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(SocketKind::Stream),
            2 => Some(SocketKind::Datagram),
            _ => None,
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Stream => write!(f, "SOCK_STREAM"),
            SocketKind::Datagram => write!(f, "SOCK_DGRAM"),
        }
    }
}

/// Opaque handle identifying one open transport resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(i32);

impl Descriptor {
    /// Wrap a raw descriptor number.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw descriptor number.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One resolved `(family, port, address)` candidate.
///
/// The family is derived from the address, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateAddress {
    ip: IpAddr,
    port: u16,
}

impl CandidateAddress {
    /// Create a candidate from an IP address and port.
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Build a candidate from the raw form the resolver reports.
    ///
    /// Returns `None` when the byte length does not match the family.
    pub fn from_bytes(family: AddressFamily, port: u16, bytes: &[u8]) -> Option<Self> {
        let ip = match family {
            AddressFamily::Inet => {
                let octets: [u8; 4] = bytes.try_into().ok()?;
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            AddressFamily::Inet6 => {
                let octets: [u8; 16] = bytes.try_into().ok()?;
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };
        Some(Self { ip, port })
    }

    /// Address family of this candidate.
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip)
    }

    /// Port number.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// IP address.
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Raw address bytes: 4 for IPv4, 16 for IPv6.
    pub fn address_bytes(&self) -> Vec<u8> {
        match self.ip {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }

    /// The candidate as a standard socket address.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<SocketAddr> for CandidateAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Primitive blocking-socket operations.
///
/// Methods take `&self` so a single provider can back many sockets;
/// implementations keep their descriptor tables behind interior mutability.
pub trait SocketProvider {
    /// Acquire a new descriptor of the given family and kind.
    fn open(&self, family: AddressFamily, kind: SocketKind) -> io::Result<Descriptor>;

    /// Resolve a hostname into an ordered list of candidates.
    ///
    /// An empty list means "no results" and is not itself an error.
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<CandidateAddress>>;

    /// Connect a descriptor to one candidate address.
    fn connect(&self, descriptor: Descriptor, address: &CandidateAddress) -> io::Result<()>;

    /// Write some prefix of `data`, returning how many bytes were written.
    fn send(&self, descriptor: Descriptor, data: &[u8]) -> io::Result<usize>;

    /// Read at most `max_bytes`. An empty result means the peer closed.
    fn recv(&self, descriptor: Descriptor, max_bytes: usize) -> io::Result<Vec<u8>>;

    /// Release a descriptor.
    fn close(&self, descriptor: Descriptor) -> io::Result<()>;
}

macro_rules! forward_provider {
    ($($wrapper:ty),+ $(,)?) => {
        $(
            impl<P: SocketProvider + ?Sized> SocketProvider for $wrapper {
                fn open(&self, family: AddressFamily, kind: SocketKind) -> io::Result<Descriptor> {
                    (**self).open(family, kind)
                }

                fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<CandidateAddress>> {
                    (**self).resolve(host, port)
                }

                fn connect(&self, descriptor: Descriptor, address: &CandidateAddress) -> io::Result<()> {
                    (**self).connect(descriptor, address)
                }

                fn send(&self, descriptor: Descriptor, data: &[u8]) -> io::Result<usize> {
                    (**self).send(descriptor, data)
                }

                fn recv(&self, descriptor: Descriptor, max_bytes: usize) -> io::Result<Vec<u8>> {
                    (**self).recv(descriptor, max_bytes)
                }

                fn close(&self, descriptor: Descriptor) -> io::Result<()> {
                    (**self).close(descriptor)
                }
            }
        )+
    };
}

forward_provider!(&P, Box<P>, Arc<P>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_constants() {
        assert_eq!(AddressFamily::Inet.as_i32(), 2);
        assert_eq!(AddressFamily::Inet6.as_i32(), 10);
        assert_eq!(AddressFamily::from_i32(2), Some(AddressFamily::Inet));
        assert_eq!(AddressFamily::from_i32(10), Some(AddressFamily::Inet6));
        assert_eq!(AddressFamily::from_i32(1), None);
    }

    #[test]
    fn test_kind_constants() {
        assert_eq!(SocketKind::Stream.as_i32(), 1);
        assert_eq!(SocketKind::Datagram.as_i32(), 2);
        assert_eq!(SocketKind::from_i32(1), Some(SocketKind::Stream));
        assert_eq!(SocketKind::from_i32(3), None);
    }

    #[test]
    fn test_candidate_from_bytes() {
        let addr = CandidateAddress::from_bytes(AddressFamily::Inet, 80, &[93, 184, 216, 34])
            .expect("valid IPv4 candidate");

        assert_eq!(addr.family(), AddressFamily::Inet);
        assert_eq!(addr.port(), 80);
        assert_eq!(addr.address_bytes(), vec![93, 184, 216, 34]);
        assert_eq!(addr.to_string(), "93.184.216.34:80");
    }

    #[test]
    fn test_candidate_rejects_mismatched_length() {
        assert!(CandidateAddress::from_bytes(AddressFamily::Inet, 80, &[0; 16]).is_none());
        assert!(CandidateAddress::from_bytes(AddressFamily::Inet6, 80, &[0; 4]).is_none());
    }

    #[test]
    fn test_candidate_from_socket_addr() {
        let sock: SocketAddr = "[::1]:443".parse().unwrap();
        let addr = CandidateAddress::from(sock);

        assert_eq!(addr.family(), AddressFamily::Inet6);
        assert_eq!(addr.address_bytes().len(), 16);
        assert_eq!(addr.socket_addr(), sock);
    }
}
