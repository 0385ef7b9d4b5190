//! The `sock_*` host functions.
//!
//! Each function validates its guest pointers before touching the provider,
//! so a bad pointer fails with `EFAULT` without side effects. A guest may only
//! use descriptors it opened itself; any other descriptor is `EBADF`. Out-params are
//! little-endian `i32`s; address records use the 19-byte layout from
//! [`wasisock_core::addr`].

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};
use wasmtime::{Caller, Extern, Memory};

use crate::errno::Errno;
use crate::store::{GuestContext, SharedProvider};
use wasisock_common::HostFunctionError;
use wasisock_core::addr::{self, ADDR_RECORD_SIZE};
use wasisock_core::{AddressFamily, Descriptor, SocketKind};

type GuestCaller<'a> = Caller<'a, GuestContext>;

/// `sock_open(af, socktype, fd_ptr) -> errno`
pub fn sock_open(caller: &mut GuestCaller<'_>, af: i32, socktype: i32, fd_ptr: i32) -> Result<(), Errno> {
    let family = AddressFamily::from_i32(af).ok_or(Errno::AFNOSUPPORT)?;
    let kind = SocketKind::from_i32(socktype).ok_or(Errno::INVAL)?;

    let memory = guest_memory(caller)?;
    check_writable(caller, memory, fd_ptr, 4)?;

    let descriptor = provider(caller).open(family, kind)?;
    write_i32(caller, memory, fd_ptr, descriptor.raw())?;

    let ctx = caller.data_mut();
    ctx.track_socket(descriptor);
    ctx.metrics.sockets_opened += 1;
    debug!(
        execution_id = %ctx.execution_id,
        fd = descriptor.raw(),
        %family,
        %kind,
        "Guest opened socket"
    );
    Ok(())
}

/// `sock_resolve(host_ptr, host_len, port, addrs_ptr, addrs_cap, count_ptr) -> errno`
///
/// `addrs_cap` counts records, not bytes. An empty resolution succeeds with
/// a count of zero.
pub fn sock_resolve(
    caller: &mut GuestCaller<'_>,
    host_ptr: i32,
    host_len: i32,
    port: i32,
    addrs_ptr: i32,
    addrs_cap: i32,
    count_ptr: i32,
) -> Result<(), Errno> {
    let host_len = guest_len(host_len, "hostname length")?;
    let port = u16::try_from(port).map_err(|_| invalid(format!("port out of range: {port}")))?;
    let capacity = guest_len(addrs_cap, "address capacity")?;
    let out_len = capacity
        .checked_mul(ADDR_RECORD_SIZE)
        .ok_or_else(|| invalid(format!("address capacity too large: {capacity}")))?;

    let memory = guest_memory(caller)?;
    let host = String::from_utf8(read_bytes(caller, memory, host_ptr, host_len)?)
        .map_err(|_| invalid("hostname is not valid UTF-8"))?;
    check_writable(caller, memory, addrs_ptr, out_len)?;
    check_writable(caller, memory, count_ptr, 4)?;

    let candidates = provider(caller).resolve(&host, port)?;
    let (records, count) = addr::encode_all(&candidates, capacity);

    write_bytes(caller, memory, addrs_ptr, &records)?;
    write_i32(caller, memory, count_ptr, to_i32(count)?)?;

    trace!(host = %host, port, count, available = candidates.len(), "Guest resolved hostname");
    Ok(())
}

/// `sock_connect(fd, addr_ptr) -> errno`
pub fn sock_connect(caller: &mut GuestCaller<'_>, fd: i32, addr_ptr: i32) -> Result<(), Errno> {
    let descriptor = owned(caller, fd)?;
    let memory = guest_memory(caller)?;
    let record = read_bytes(caller, memory, addr_ptr, ADDR_RECORD_SIZE)?;
    let address = addr::decode(&record).map_err(|e| invalid(e.to_string()))?;

    provider(caller).connect(descriptor, &address)?;

    debug!(
        execution_id = %caller.data().execution_id,
        fd,
        address = %address,
        "Guest connected socket"
    );
    Ok(())
}

/// `sock_send(fd, buf_ptr, buf_len, sent_ptr) -> errno`
pub fn sock_send(
    caller: &mut GuestCaller<'_>,
    fd: i32,
    buf_ptr: i32,
    buf_len: i32,
    sent_ptr: i32,
) -> Result<(), Errno> {
    let descriptor = owned(caller, fd)?;
    let len = guest_len(buf_len, "buffer length")?;

    let memory = guest_memory(caller)?;
    let data = read_bytes(caller, memory, buf_ptr, len)?;
    check_writable(caller, memory, sent_ptr, 4)?;

    let sent = provider(caller).send(descriptor, &data)?.min(len);
    write_i32(caller, memory, sent_ptr, to_i32(sent)?)?;

    caller.data_mut().metrics.bytes_sent += sent as u64;
    trace!(fd, requested = len, sent, "Guest send");
    Ok(())
}

/// `sock_recv(fd, buf_ptr, buf_len, recvd_ptr) -> errno`
///
/// A zero-length buffer succeeds immediately with zero bytes received.
pub fn sock_recv(
    caller: &mut GuestCaller<'_>,
    fd: i32,
    buf_ptr: i32,
    buf_len: i32,
    recvd_ptr: i32,
) -> Result<(), Errno> {
    let descriptor = owned(caller, fd)?;
    let len = guest_len(buf_len, "buffer length")?;

    let memory = guest_memory(caller)?;
    check_writable(caller, memory, buf_ptr, len)?;
    check_writable(caller, memory, recvd_ptr, 4)?;

    if len == 0 {
        return write_i32(caller, memory, recvd_ptr, 0).map_err(Errno::from);
    }

    let mut data = provider(caller).recv(descriptor, len)?;
    data.truncate(len);
    write_bytes(caller, memory, buf_ptr, &data)?;
    write_i32(caller, memory, recvd_ptr, to_i32(data.len())?)?;

    caller.data_mut().metrics.bytes_received += data.len() as u64;
    trace!(fd, max_bytes = len, received = data.len(), "Guest recv");
    Ok(())
}

/// `sock_close(fd) -> errno`
pub fn sock_close(caller: &mut GuestCaller<'_>, fd: i32) -> Result<(), Errno> {
    let descriptor = owned(caller, fd)?;
    caller.data_mut().untrack_socket(descriptor);
    provider(caller).close(descriptor)?;
    debug!(execution_id = %caller.data().execution_id, fd, "Guest closed socket");
    Ok(())
}

/// Clone the provider out of the store so no store borrow is held while it
/// blocks.
fn provider(caller: &GuestCaller<'_>) -> SharedProvider {
    Arc::clone(caller.data().provider())
}

/// The descriptor, if this guest opened it and has not closed it.
fn owned(caller: &GuestCaller<'_>, fd: i32) -> Result<Descriptor, Errno> {
    let descriptor = Descriptor::new(fd);
    if caller.data().owns_socket(descriptor) {
        Ok(descriptor)
    } else {
        Err(Errno::BADF)
    }
}

fn invalid(reason: impl Into<String>) -> HostFunctionError {
    HostFunctionError::InvalidArgument {
        reason: reason.into(),
    }
}

fn guest_len(len: i32, what: &str) -> Result<usize, HostFunctionError> {
    usize::try_from(len).map_err(|_| invalid(format!("negative {what}: {len}")))
}

fn to_i32(n: usize) -> Result<i32, HostFunctionError> {
    i32::try_from(n).map_err(|_| invalid(format!("count does not fit in i32: {n}")))
}

fn guest_memory(caller: &mut GuestCaller<'_>) -> Result<Memory, HostFunctionError> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or(HostFunctionError::MemoryNotExported)
}

fn guest_range(ptr: i32, len: usize, memory_size: usize) -> Result<Range<usize>, HostFunctionError> {
    let out_of_bounds = || HostFunctionError::MemoryOutOfBounds {
        ptr: i64::from(ptr),
        len: i64::try_from(len).unwrap_or(i64::MAX),
    };

    let start = usize::try_from(ptr).map_err(|_| out_of_bounds())?;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= memory_size)
        .ok_or_else(out_of_bounds)?;
    Ok(start..end)
}

fn check_writable(
    caller: &GuestCaller<'_>,
    memory: Memory,
    ptr: i32,
    len: usize,
) -> Result<(), HostFunctionError> {
    guest_range(ptr, len, memory.data_size(caller)).map(|_| ())
}

fn read_bytes(
    caller: &GuestCaller<'_>,
    memory: Memory,
    ptr: i32,
    len: usize,
) -> Result<Vec<u8>, HostFunctionError> {
    let data = memory.data(caller);
    let range = guest_range(ptr, len, data.len())?;
    Ok(data[range].to_vec())
}

fn write_bytes(
    caller: &mut GuestCaller<'_>,
    memory: Memory,
    ptr: i32,
    bytes: &[u8],
) -> Result<(), HostFunctionError> {
    let data = memory.data_mut(caller);
    let range = guest_range(ptr, bytes.len(), data.len())?;
    data[range].copy_from_slice(bytes);
    Ok(())
}

fn write_i32(
    caller: &mut GuestCaller<'_>,
    memory: Memory,
    ptr: i32,
    value: i32,
) -> Result<(), HostFunctionError> {
    write_bytes(caller, memory, ptr, &value.to_le_bytes())
}
