//! Fixed-size address records exchanged with guests.
//!
//! A record is [`ADDR_RECORD_SIZE`] bytes:
//!
//! ```text
//! [0]      family (2 = IPv4, 10 = IPv6)
//! [1..3]   port, big-endian
//! [3..19]  address; IPv4 uses [3..7] and zero-fills the rest
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

use crate::provider::{AddressFamily, CandidateAddress};

/// Size of one encoded address record.
pub const ADDR_RECORD_SIZE: usize = 19;

/// Most candidates a single resolve call hands back to a guest.
pub const MAX_RESOLVE_ADDRS: usize = 10;

/// Errors decoding an address record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    /// Fewer than [`ADDR_RECORD_SIZE`] bytes were supplied.
    #[error("address record truncated: {len} bytes")]
    Truncated {
        /// Bytes actually available.
        len: usize,
    },

    /// The family byte is neither IPv4 nor IPv6.
    #[error("unknown address family: {0}")]
    UnknownFamily(u8),

    /// An IPv4 record carried data in the unused tail.
    #[error("IPv4 address record has non-zero padding")]
    NonZeroPadding,
}

/// Encode a candidate into a record.
pub fn encode(address: &CandidateAddress) -> [u8; ADDR_RECORD_SIZE] {
    let mut record = [0u8; ADDR_RECORD_SIZE];
    record[0] = match address.family() {
        AddressFamily::Inet => 2,
        AddressFamily::Inet6 => 10,
    };
    record[1..3].copy_from_slice(&address.port().to_be_bytes());
    match address.ip() {
        IpAddr::V4(v4) => record[3..7].copy_from_slice(&v4.octets()),
        IpAddr::V6(v6) => record[3..19].copy_from_slice(&v6.octets()),
    }
    record
}

/// Decode the record at the start of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<CandidateAddress, AddrError> {
    let Some(record) = bytes.get(..ADDR_RECORD_SIZE) else {
        return Err(AddrError::Truncated { len: bytes.len() });
    };

    let port = u16::from_be_bytes([record[1], record[2]]);
    let family =
        AddressFamily::from_i32(i32::from(record[0])).ok_or(AddrError::UnknownFamily(record[0]))?;

    let ip = match family {
        AddressFamily::Inet => {
            if record[7..].iter().any(|&b| b != 0) {
                return Err(AddrError::NonZeroPadding);
            }
            IpAddr::V4(Ipv4Addr::new(record[3], record[4], record[5], record[6]))
        }
        AddressFamily::Inet6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&record[3..19]);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };

    Ok(CandidateAddress::new(ip, port))
}

/// Encode up to `capacity` candidates back to back.
///
/// Returns the buffer and the number of records written.
pub fn encode_all(addresses: &[CandidateAddress], capacity: usize) -> (Vec<u8>, usize) {
    let count = addresses.len().min(capacity);
    let mut buf = Vec::with_capacity(count * ADDR_RECORD_SIZE);
    for address in &addresses[..count] {
        buf.extend_from_slice(&encode(address));
    }
    (buf, count)
}
