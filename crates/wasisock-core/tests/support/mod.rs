//! Scripted provider shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use parking_lot::Mutex;
use wasisock_core::{AddressFamily, CandidateAddress, Descriptor, SocketKind, SocketProvider};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(AddressFamily, SocketKind),
    Resolve(String, u16),
    Connect(i32, CandidateAddress),
    Send(i32, usize),
    Recv(i32, usize),
    Close(i32),
}

/// Provider whose results are scripted up front and whose calls are recorded.
///
/// Unscripted calls succeed: `send` writes everything, `recv` returns
/// nothing, `connect` succeeds.
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<Call>>,
    candidates: Mutex<Vec<CandidateAddress>>,
    resolve_error: Mutex<Option<io::ErrorKind>>,
    open_error: Mutex<Option<io::ErrorKind>>,
    connect_results: Mutex<VecDeque<io::Result<()>>>,
    send_results: Mutex<VecDeque<io::Result<usize>>>,
    recv_results: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    close_error: Mutex<bool>,
    written: Mutex<Vec<u8>>,
}

pub fn ipv4(a: u8, b: u8, c: u8, d: u8, port: u16) -> CandidateAddress {
    CandidateAddress::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), port)
}

impl MockProvider {
    /// A provider whose resolver returns `93.184.216.34` for every host.
    pub fn new() -> Self {
        Self::resolving(vec![ipv4(93, 184, 216, 34, 80)])
    }

    pub fn resolving(candidates: Vec<CandidateAddress>) -> Self {
        let mock = Self::default();
        *mock.candidates.lock() = candidates;
        mock
    }

    pub fn fail_open(&self, kind: io::ErrorKind) {
        *self.open_error.lock() = Some(kind);
    }

    pub fn fail_resolve(&self, kind: io::ErrorKind) {
        *self.resolve_error.lock() = Some(kind);
    }

    pub fn push_connect(&self, result: io::Result<()>) {
        self.connect_results.lock().push_back(result);
    }

    pub fn push_send(&self, result: io::Result<usize>) {
        self.send_results.lock().push_back(result);
    }

    pub fn push_recv(&self, result: io::Result<Vec<u8>>) {
        self.recv_results.lock().push_back(result);
    }

    pub fn fail_close(&self) {
        *self.close_error.lock() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn closes(&self) -> usize {
        self.count(|c| matches!(c, Call::Close(_)))
    }

    pub fn sends(&self) -> usize {
        self.count(|c| matches!(c, Call::Send(..)))
    }

    pub fn connects(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect(..)))
    }

    pub fn resolves(&self) -> usize {
        self.count(|c| matches!(c, Call::Resolve(..)))
    }

    /// Bytes the provider reported as written, in order.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl SocketProvider for MockProvider {
    fn open(&self, family: AddressFamily, kind: SocketKind) -> io::Result<Descriptor> {
        self.record(Call::Open(family, kind));
        match *self.open_error.lock() {
            Some(kind) => Err(kind.into()),
            None => Ok(Descriptor::new(42)),
        }
    }

    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<CandidateAddress>> {
        self.record(Call::Resolve(host.to_string(), port));
        if let Some(kind) = *self.resolve_error.lock() {
            return Err(kind.into());
        }
        Ok(self.candidates.lock().clone())
    }

    fn connect(&self, descriptor: Descriptor, address: &CandidateAddress) -> io::Result<()> {
        self.record(Call::Connect(descriptor.raw(), *address));
        self.connect_results.lock().pop_front().unwrap_or(Ok(()))
    }

    fn send(&self, descriptor: Descriptor, data: &[u8]) -> io::Result<usize> {
        self.record(Call::Send(descriptor.raw(), data.len()));
        let n = match self.send_results.lock().pop_front() {
            Some(Ok(n)) => n.min(data.len()),
            Some(Err(e)) => return Err(e),
            None => data.len(),
        };
        self.written.lock().extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn recv(&self, descriptor: Descriptor, max_bytes: usize) -> io::Result<Vec<u8>> {
        self.record(Call::Recv(descriptor.raw(), max_bytes));
        self.recv_results.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn close(&self, descriptor: Descriptor) -> io::Result<()> {
        self.record(Call::Close(descriptor.raw()));
        if *self.close_error.lock() {
            return Err(io::Error::from_raw_os_error(9));
        }
        Ok(())
    }
}
