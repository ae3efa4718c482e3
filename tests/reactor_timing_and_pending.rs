// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Testable properties from §8 that cut across the reactor and I/O device
//! rather than living inside either module's own unit tests:
//!
//! - a reactor with no enabled `Selectable`s and no timers returns from
//!   `wait_until(now + delta)` after at least `delta`, with nothing to
//!   dispatch;
//! - a second `begin_read` issued before the first's `end_read` raises
//!   `IoPending` and leaves the original read's buffer untouched.

use std::time::{Duration, Instant};

use conduit_rt::{Error, Pipe, Reactor};

#[test]
fn wait_until_with_nothing_registered_takes_at_least_the_requested_delta() {
    let reactor = Reactor::new().unwrap();
    let delta = Duration::from_millis(150);
    let start = Instant::now();
    let became_ready = reactor.wait_until(Some(start + delta)).unwrap();
    assert!(start.elapsed() >= delta);
    assert!(!became_ready);
}

#[test]
fn overlapping_begin_read_raises_io_pending_without_touching_the_first_buffer() {
    let pipe = Pipe::new(true, false).unwrap();
    let device = pipe.out_end().device().clone();

    let first = device.begin_read(vec![0u8; 16]).unwrap();
    assert_eq!(first, 0); // nothing written yet, so the attempt returns immediately with 0 bytes

    let err = device.begin_read(vec![0u8; 16]).unwrap_err();
    assert!(matches!(err, Error::IoPending));

    // The first op is still the one in flight; end_read drains it, not a
    // second, silently-overwritten buffer.
    let (buf, filled, _eof) = device.end_read().unwrap();
    assert_eq!(buf.len(), 16);
    assert_eq!(filled, 0);
}
