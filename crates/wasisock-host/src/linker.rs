//! Host function registration for Wasmtime linkers.
//!
//! Guests see the standard `wasi_snapshot_preview1` imports plus six socket
//! functions in the same namespace:
//!
//! | import         | signature                                                         |
//! |----------------|-------------------------------------------------------------------|
//! | `sock_open`    | `(af, socktype, fd_ptr) -> errno`                                 |
//! | `sock_resolve` | `(host_ptr, host_len, port, addrs_ptr, addrs_cap, count_ptr) -> errno` |
//! | `sock_connect` | `(fd, addr_ptr) -> errno`                                         |
//! | `sock_send`    | `(fd, buf_ptr, buf_len, sent_ptr) -> errno`                       |
//! | `sock_recv`    | `(fd, buf_ptr, buf_len, recvd_ptr) -> errno`                      |
//! | `sock_close`   | `(fd) -> errno`                                                   |
//!
//! `sock_send` and `sock_recv` replace preview1's functions of the same name.

use tracing::debug;
use wasmtime::{Caller, Linker};

use crate::errno::{self, Errno};
use crate::sockets;
use crate::store::GuestContext;
use wasisock_common::{RuntimeError, WasiError};

/// The import module every socket function is registered under.
pub const SOCKET_MODULE: &str = "wasi_snapshot_preview1";

/// Register WASI preview1 and the socket functions on a linker.
///
/// # Errors
///
/// Returns an error if function registration fails.
pub fn register_all(linker: &mut Linker<GuestContext>) -> Result<(), RuntimeError> {
    register_wasi(linker)?;
    register_sockets(linker)?;
    Ok(())
}

/// Register the standard preview1 imports.
pub fn register_wasi(linker: &mut Linker<GuestContext>) -> Result<(), RuntimeError> {
    wasmtime_wasi::preview1::add_to_linker_sync(linker, GuestContext::wasi_mut).map_err(|e| {
        RuntimeError::from(WasiError::InitializationFailed {
            reason: format!("Failed to link wasi_snapshot_preview1: {e}"),
        })
    })
}

/// Log a failed import and turn its result into the guest return value.
fn complete(import: &'static str, caller: &Caller<'_, GuestContext>, result: Result<(), Errno>) -> i32 {
    if let Err(errno) = result {
        debug!(
            execution_id = %caller.data().execution_id,
            import,
            errno = errno.raw(),
            "Socket import failed"
        );
    }
    errno::to_guest(result)
}

/// Register the six socket functions.
///
/// Shadowing is enabled for the duration so the socket versions of
/// `sock_send` / `sock_recv` replace any preview1 definitions.
pub fn register_sockets(linker: &mut Linker<GuestContext>) -> Result<(), RuntimeError> {
    linker.allow_shadowing(true);
    let result = define_sockets(linker);
    linker.allow_shadowing(false);

    result.map_err(|e| RuntimeError::invalid_config(format!("Failed to register socket functions: {e}")))
}

fn define_sockets(linker: &mut Linker<GuestContext>) -> wasmtime::Result<()> {
    linker.func_wrap(
        SOCKET_MODULE,
        "sock_open",
        |mut caller: Caller<'_, GuestContext>, af: i32, socktype: i32, fd_ptr: i32| -> i32 {
            let result = sockets::sock_open(&mut caller, af, socktype, fd_ptr);
            complete("sock_open", &caller, result)
        },
    )?;

    linker.func_wrap(
        SOCKET_MODULE,
        "sock_resolve",
        |mut caller: Caller<'_, GuestContext>,
         host_ptr: i32,
         host_len: i32,
         port: i32,
         addrs_ptr: i32,
         addrs_cap: i32,
         count_ptr: i32|
         -> i32 {
            let result = sockets::sock_resolve(
                &mut caller,
                host_ptr,
                host_len,
                port,
                addrs_ptr,
                addrs_cap,
                count_ptr,
            );
            complete("sock_resolve", &caller, result)
        },
    )?;

    linker.func_wrap(
        SOCKET_MODULE,
        "sock_connect",
        |mut caller: Caller<'_, GuestContext>, fd: i32, addr_ptr: i32| -> i32 {
            let result = sockets::sock_connect(&mut caller, fd, addr_ptr);
            complete("sock_connect", &caller, result)
        },
    )?;

    linker.func_wrap(
        SOCKET_MODULE,
        "sock_send",
        |mut caller: Caller<'_, GuestContext>, fd: i32, buf_ptr: i32, buf_len: i32, sent_ptr: i32| -> i32 {
            let result = sockets::sock_send(&mut caller, fd, buf_ptr, buf_len, sent_ptr);
            complete("sock_send", &caller, result)
        },
    )?;

    linker.func_wrap(
        SOCKET_MODULE,
        "sock_recv",
        |mut caller: Caller<'_, GuestContext>, fd: i32, buf_ptr: i32, buf_len: i32, recvd_ptr: i32| -> i32 {
            let result = sockets::sock_recv(&mut caller, fd, buf_ptr, buf_len, recvd_ptr);
            complete("sock_recv", &caller, result)
        },
    )?;

    linker.func_wrap(
        SOCKET_MODULE,
        "sock_close",
        |mut caller: Caller<'_, GuestContext>, fd: i32| -> i32 {
            let result = sockets::sock_close(&mut caller, fd);
            complete("sock_close", &caller, result)
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WasmEngine;
    use wasisock_common::EngineConfig;

    fn linker() -> Linker<GuestContext> {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
        Linker::new(engine.inner())
    }

    #[test]
    fn test_register_sockets() {
        let mut linker = linker();
        assert!(register_sockets(&mut linker).is_ok());
        // registering twice only works because shadowing is enabled inside
        assert!(register_sockets(&mut linker).is_ok());
    }

    #[test]
    fn test_register_all() {
        let mut linker = linker();
        assert!(register_all(&mut linker).is_ok());
    }
}
