// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `EventLoop` (§4.E): a [`Reactor`] plus a cross-thread-safe event queue
//! and an idle timeout.
//!
//! Grounded on the teacher's `core::rt::waitset::WaitsetDriver` run-loop
//! shape (wait, drain ready work, repeat) generalized from RTPS-specific
//! wake reasons to an opaque, user-supplied event queue. The recursive
//! queue lock follows the spec's own `parking_lot::ReentrantMutex` call-out
//! in §5: `commit_event` may run from any thread, `process_events` only
//! ever runs on the loop's own thread, so the two never actually contend
//! for the same acquisition — but a handler that itself calls
//! `commit_event` while already holding the dispatch path must not
//! deadlock, hence reentrant rather than a plain mutex.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::ReentrantMutex;

use crate::error::Result;
use crate::reactor::{Reactor, WakeHandle};

/// A unit of deferred work queued onto an [`EventLoop`]. Implementors
/// typically close over whatever state a handler needs; `dispatch` runs on
/// the loop's own thread regardless of which thread queued the event.
pub trait Event: Send {
    fn dispatch(self: Box<Self>);
}

impl<F: FnOnce() + Send> Event for F {
    fn dispatch(self: Box<Self>) {
        (*self)()
    }
}

struct Queue {
    events: VecDeque<Box<dyn Event>>,
}

/// A `Send + Sync` capability for queuing events and waking the loop from
/// any thread, independent of the (non-`Send`) `EventLoop` itself.
#[derive(Clone)]
pub struct Committer {
    queue: Arc<ReentrantMutex<RefCell<Queue>>>,
    wake: WakeHandle,
}

impl Committer {
    pub fn commit_event(&self, event: impl Event + 'static) {
        let guard = self.queue.lock();
        guard.borrow_mut().events.push_back(Box::new(event));
        drop(guard);
        self.wake.wake();
    }

    pub fn commit_priority_event(&self, event: impl Event + 'static) {
        let guard = self.queue.lock();
        guard.borrow_mut().events.push_front(Box::new(event));
        drop(guard);
        self.wake.wake();
    }
}

/// Callbacks an `EventLoop` user may implement; all default to doing
/// nothing so a caller only overrides what it needs.
pub trait LoopHandler {
    fn on_idle_timeout(&mut self) {}
    fn on_exit(&mut self) {}
}

struct NullHandler;
impl LoopHandler for NullHandler {}

/// The reactor plus its event queue and idle-timeout policy.
pub struct EventLoop {
    reactor: Reactor,
    queue: Arc<ReentrantMutex<RefCell<Queue>>>,
    exit_flag: Arc<AtomicBool>,
    idle_timeout: Duration,
    handler: Box<dyn LoopHandler>,
}

impl EventLoop {
    pub fn new(reactor: Reactor, idle_timeout: Duration) -> Self {
        Self {
            reactor,
            queue: Arc::new(ReentrantMutex::new(RefCell::new(Queue {
                events: VecDeque::new(),
            }))),
            exit_flag: Arc::new(AtomicBool::new(false)),
            idle_timeout,
            handler: Box::new(NullHandler),
        }
    }

    pub fn set_handler(&mut self, handler: Box<dyn LoopHandler>) {
        self.handler = handler;
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// A cloneable, `Send + Sync` handle other threads use to queue events
    /// and wake this loop.
    pub fn committer(&self) -> Committer {
        Committer {
            queue: self.queue.clone(),
            wake: self.reactor.wake_handle(),
        }
    }

    /// Thread-safe request to stop the loop after its current dispatch
    /// cycle finishes.
    pub fn exit_handle(&self) -> ExitHandle {
        ExitHandle {
            flag: self.exit_flag.clone(),
            wake: self.reactor.wake_handle(),
        }
    }

    fn queue_is_empty(&self) -> bool {
        let guard = self.queue.lock();
        let empty = guard.borrow().events.is_empty();
        empty
    }

    /// Dequeue and dispatch every event currently queued, each event
    /// dropped after `dispatch` runs (or if `dispatch` never gets called
    /// because the loop drops before draining — events are never leaked
    /// into a zombie state, they are simply dropped).
    pub fn process_events(&mut self) {
        loop {
            let next = {
                let guard = self.queue.lock();
                guard.borrow_mut().events.pop_front()
            };
            match next {
                Some(event) => event.dispatch(),
                None => break,
            }
        }
    }

    /// Run until `exit()` is called. Repeatedly drains the queue if
    /// non-empty, otherwise waits on the reactor for up to `idle_timeout`,
    /// firing `on_idle_timeout` if nothing became ready during the wait.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.exit_flag.load(Ordering::Acquire) {
                break;
            }
            if !self.queue_is_empty() {
                self.process_events();
                continue;
            }
            let deadline = Instant::now() + self.idle_timeout;
            let became_ready = self.reactor.wait_until(Some(deadline))?;
            if self.exit_flag.load(Ordering::Acquire) {
                break;
            }
            if !became_ready && self.queue_is_empty() {
                self.handler.on_idle_timeout();
            }
        }
        self.handler.on_exit();
        Ok(())
    }

    /// Run a single `process_events` + `wait` cycle; useful for embedding
    /// this loop's polling inside another loop instead of calling `run`.
    pub fn step(&mut self, timeout: Duration) -> Result<bool> {
        if !self.queue_is_empty() {
            self.process_events();
            return Ok(true);
        }
        self.reactor.wait(timeout)
    }

    pub fn exit(&self) {
        self.exit_flag.store(true, Ordering::Release);
        self.reactor.wake();
    }
}

/// Thread-safe handle to stop an [`EventLoop`]'s `run` from any thread.
#[derive(Clone)]
pub struct ExitHandle {
    flag: Arc<AtomicBool>,
    wake: WakeHandle,
}

impl ExitHandle {
    pub fn exit(&self) {
        self.flag.store(true, Ordering::Release);
        self.wake.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn committed_event_dispatches_on_next_process_events() {
        let reactor = Reactor::new().unwrap();
        let mut loop_ = EventLoop::new(reactor, Duration::from_millis(50));
        let committer = loop_.committer();

        let (tx, rx) = mpsc::channel();
        committer.commit_event(move || {
            tx.send(42).unwrap();
        });

        loop_.process_events();
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[test]
    fn priority_event_runs_before_a_previously_queued_one() {
        let reactor = Reactor::new().unwrap();
        let mut loop_ = EventLoop::new(reactor, Duration::from_millis(50));
        let committer = loop_.committer();

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        committer.commit_event(move || o1.lock().unwrap().push(1));
        let o2 = order.clone();
        committer.commit_priority_event(move || o2.lock().unwrap().push(2));

        loop_.process_events();
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn exit_from_another_thread_stops_run() {
        let reactor = Reactor::new().unwrap();
        let mut loop_ = EventLoop::new(reactor, Duration::from_millis(20));
        let exit = loop_.exit_handle();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            exit.exit();
        });

        loop_.run().unwrap();
        handle.join().unwrap();
    }
}
