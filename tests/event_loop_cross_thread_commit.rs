// SPDX-License-Identifier: Apache-2.0 OR MIT

//! §8's cross-thread ordering property: a `commit_event` issued from
//! another thread is observed by the loop thread only after that thread's
//! writes prior to the commit are visible (happens-before via the queue
//! mutex plus the wake-pipe), and `run` actually wakes and dispatches it
//! rather than sitting in its idle wait until the timeout expires.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use conduit_rt::event_loop::LoopHandler;
use conduit_rt::{EventLoop, Reactor};

struct RecordIdleTimeouts(Arc<AtomicUsize>);
impl LoopHandler for RecordIdleTimeouts {
    fn on_idle_timeout(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn a_cross_thread_commit_wakes_run_well_before_the_idle_timeout() {
    let reactor = Reactor::new().unwrap();
    let mut loop_ = EventLoop::new(reactor, Duration::from_secs(5));
    let idle_count = Arc::new(AtomicUsize::new(0));
    loop_.set_handler(Box::new(RecordIdleTimeouts(idle_count.clone())));

    let committer = loop_.committer();
    let exit = loop_.exit_handle();
    let (tx, rx) = mpsc::channel();

    // A shared counter the spawned thread bumps before committing, so the
    // loop thread observing the committed closure also observes the bump —
    // exactly the happens-before the queue mutex + wake-pipe are meant to
    // provide.
    let shared = Arc::new(AtomicUsize::new(0));
    let shared_for_writer = shared.clone();
    let start = Instant::now();

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        shared_for_writer.store(99, Ordering::SeqCst);
        committer.commit_event(move || {
            tx.send(()).unwrap();
        });
    });

    // Drain the single committed event, then exit the loop from this same
    // thread (run() only returns once the queue is empty and exit_flag is
    // set).
    let exit_after_drain = thread::spawn(move || {
        rx.recv_timeout(Duration::from_secs(2)).expect("event never dispatched");
        exit.exit();
    });

    loop_.run().unwrap();
    writer.join().unwrap();
    exit_after_drain.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(1), "run() should have woken on the commit, not idled out");
    assert_eq!(shared.load(Ordering::SeqCst), 99);
    assert_eq!(idle_count.load(Ordering::SeqCst), 0);
}
