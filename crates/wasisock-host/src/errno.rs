//! WASI errno values returned by the socket imports.

use std::fmt;
use std::io;

use wasisock_common::HostFunctionError;

/// A `wasi_snapshot_preview1` errno.
///
/// Socket imports return one of these as their `i32` result; `0` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(i32);

impl Errno {
    pub const SUCCESS: Errno = Errno(0);
    pub const ACCES: Errno = Errno(2);
    pub const ADDRINUSE: Errno = Errno(3);
    pub const ADDRNOTAVAIL: Errno = Errno(4);
    pub const AFNOSUPPORT: Errno = Errno(5);
    pub const AGAIN: Errno = Errno(6);
    pub const BADF: Errno = Errno(8);
    pub const CONNABORTED: Errno = Errno(13);
    pub const CONNREFUSED: Errno = Errno(14);
    pub const CONNRESET: Errno = Errno(15);
    pub const FAULT: Errno = Errno(21);
    pub const HOSTUNREACH: Errno = Errno(23);
    pub const INTR: Errno = Errno(27);
    pub const INVAL: Errno = Errno(28);
    pub const IO: Errno = Errno(29);
    pub const ISCONN: Errno = Errno(30);
    pub const NETUNREACH: Errno = Errno(40);
    pub const NOTCONN: Errno = Errno(53);
    pub const NOTSUP: Errno = Errno(58);
    pub const PIPE: Errno = Errno(64);
    pub const TIMEDOUT: Errno = Errno(73);

    /// The raw value handed to the guest.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns `true` for [`Errno::SUCCESS`].
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

impl From<&io::Error> for Errno {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Errno::ACCES,
            io::ErrorKind::AddrInUse => Errno::ADDRINUSE,
            io::ErrorKind::AddrNotAvailable => Errno::ADDRNOTAVAIL,
            io::ErrorKind::WouldBlock => Errno::AGAIN,
            // providers report unknown descriptors as NotFound
            io::ErrorKind::NotFound => Errno::BADF,
            io::ErrorKind::ConnectionAborted => Errno::CONNABORTED,
            io::ErrorKind::ConnectionRefused => Errno::CONNREFUSED,
            io::ErrorKind::ConnectionReset => Errno::CONNRESET,
            io::ErrorKind::HostUnreachable => Errno::HOSTUNREACH,
            io::ErrorKind::NetworkUnreachable => Errno::NETUNREACH,
            io::ErrorKind::Interrupted => Errno::INTR,
            io::ErrorKind::InvalidInput => Errno::INVAL,
            io::ErrorKind::AlreadyExists => Errno::ISCONN,
            io::ErrorKind::NotConnected => Errno::NOTCONN,
            io::ErrorKind::Unsupported => Errno::NOTSUP,
            io::ErrorKind::BrokenPipe => Errno::PIPE,
            io::ErrorKind::TimedOut => Errno::TIMEDOUT,
            _ => Errno::IO,
        }
    }
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Self {
        Errno::from(&err)
    }
}

impl From<HostFunctionError> for Errno {
    fn from(err: HostFunctionError) -> Self {
        match err {
            HostFunctionError::PermissionDenied { .. } => Errno::ACCES,
            HostFunctionError::InvalidArgument { .. } => Errno::INVAL,
            HostFunctionError::MemoryOutOfBounds { .. } | HostFunctionError::MemoryNotExported => {
                Errno::FAULT
            }
        }
    }
}

/// Collapse a host function result into the guest's return value.
pub fn to_guest(result: Result<(), Errno>) -> i32 {
    match result {
        Ok(()) => Errno::SUCCESS.raw(),
        Err(errno) => errno.raw(),
    }
}
