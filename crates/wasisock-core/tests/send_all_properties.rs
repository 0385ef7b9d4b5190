//! Property tests for `Socket::send_all` under arbitrary partial writes.

mod support;

use proptest::prelude::*;
use support::MockProvider;
use wasisock_core::{Socket, SocketError};

/// Split `total` into positive chunk sizes drawn from `cuts`.
fn chunks_for(total: usize, cuts: &[usize]) -> Vec<usize> {
    let mut remaining = total;
    let mut chunks = Vec::new();
    for cut in cuts {
        if remaining == 0 {
            break;
        }
        let n = (*cut).clamp(1, remaining);
        chunks.push(n);
        remaining -= n;
    }
    if remaining > 0 {
        chunks.push(remaining);
    }
    chunks
}

proptest! {
    #[test]
    fn send_all_writes_every_byte_in_order(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        cuts in prop::collection::vec(1usize..64, 0..32),
    ) {
        let chunks = chunks_for(payload.len(), &cuts);
        let mock = MockProvider::new();
        for n in &chunks {
            mock.push_send(Ok(*n));
        }

        let mut sock = Socket::stream(&mock).unwrap();
        sock.connect("example.com", 80).unwrap();
        sock.send_all(&payload).unwrap();

        prop_assert_eq!(mock.written(), payload);
        prop_assert_eq!(mock.sends(), chunks.len());
    }

    #[test]
    fn send_all_stops_at_first_zero_write(
        payload in prop::collection::vec(any::<u8>(), 2..256),
        step in 0usize..8,
    ) {
        // one byte per call keeps every step short of the full payload
        let step = step.min(payload.len() - 1);
        let mock = MockProvider::new();
        for _ in 0..step {
            mock.push_send(Ok(1));
        }
        mock.push_send(Ok(0));

        let mut sock = Socket::stream(&mock).unwrap();
        sock.connect("example.com", 80).unwrap();
        let err = sock.send_all(&payload).unwrap_err();

        let is_closed_during_send = matches!(
            err,
            SocketError::ConnectionClosedDuringSend { sent, total } if sent == step && total == payload.len()
        );
        prop_assert!(is_closed_during_send);
        prop_assert_eq!(mock.sends(), step + 1);
        prop_assert!(sock.is_connected());
    }
}
