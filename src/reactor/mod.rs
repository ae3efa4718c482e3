// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reactor: a single-threaded, descriptor-multiplexing event loop.
//!
//! Grounded on the teacher's `transport::tcp::io_thread::IoThread` (mio
//! `Poll`/`Token`/`Events`/`Waker` driving a dedicated poll loop) and its
//! `core::rt::waitset::WaitsetDriver` (self-pipe / eventfd based cross-thread
//! wakeup). Unlike the teacher's RTPS-specific `IoThread`, this reactor is a
//! generic `Selectable` multiplexer with no message-type awareness of its
//! own — readiness is all it reports.

pub mod selectable;
pub mod timer;

pub use selectable::{Selectable, State};
pub use timer::{TimerId, TimerMap};

use std::cell::RefCell;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::config::ReactorConfig;
use crate::error::{Error, Result};

const WAKE_TOKEN: Token = Token(0);
const FIRST_DEVICE_TOKEN: usize = 1;

struct Slot {
    selectable: std::rc::Weak<dyn Selectable>,
    registered: Option<Interest>,
}

struct WakePipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl WakePipe {
    fn new() -> Result<Self> {
        let mut fds = [0i32; 2];
        // SAFETY: `fds` is a valid 2-element buffer; pipe2 fills both ends
        // or returns -1, which we check below.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc != 0 {
            return Err(Error::System(format!(
                "pipe2 failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    fn wake(&self) {
        let byte: [u8; 1] = [1];
        // SAFETY: write_fd is open for the lifetime of the reactor; a short
        // write or EAGAIN (pipe already has a pending wake byte) is fine —
        // wake() is explicitly idempotent/coalescing.
        unsafe {
            let _ = libc::write(self.write_fd, byte.as_ptr() as *const libc::c_void, 1);
        }
    }

    fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: read_fd is open and non-blocking; short reads loop
            // until EAGAIN.
            let n = unsafe {
                libc::read(
                    self.read_fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

/// A cheap, `Copy`, `Send + Sync` capability to wake a [`Reactor`] from any
/// thread. Outlives the reactor only as long as the caller is careful not
/// to use it after the reactor itself has dropped (the descriptor would
/// then either be closed or, worse, reused by an unrelated `open`).
#[derive(Debug, Clone, Copy)]
pub struct WakeHandle(RawFd);

impl WakeHandle {
    pub fn wake(&self) {
        let byte: [u8; 1] = [1];
        // SAFETY: see WakePipe::wake — same fire-and-forget, best-effort
        // semantics, just callable without borrowing the Reactor's Rc.
        unsafe {
            let _ = libc::write(self.0, byte.as_ptr() as *const libc::c_void, 1);
        }
    }
}

struct Inner {
    poll: Poll,
    events: Events,
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    dirty: bool,
    wake: WakePipe,
    timers: TimerMap,
    timer_callbacks: std::collections::HashMap<TimerId, Box<dyn FnMut()>>,
    config: ReactorConfig,
}

/// A cheap-clone handle to a reactor. Per §5's scheduling model a reactor is
/// single-threaded, so sharing is via `Rc<RefCell<_>>` rather than
/// `Arc<Mutex<_>>` — every caller of reactor methods runs on the reactor's
/// own thread.
#[derive(Clone)]
pub struct Reactor(Rc<RefCell<Inner>>);

impl Reactor {
    /// Construct a new reactor with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ReactorConfig::default())
    }

    pub fn with_config(config: ReactorConfig) -> Result<Self> {
        let poll = Poll::new().map_err(|e| Error::System(format!("Poll::new failed: {e}")))?;
        let wake = WakePipe::new()?;
        poll.registry()
            .register(
                &mut SourceFd(&wake.read_fd),
                WAKE_TOKEN,
                Interest::READABLE,
            )
            .map_err(|e| Error::System(format!("failed to register wake pipe: {e}")))?;
        Ok(Self(Rc::new(RefCell::new(Inner {
            poll,
            events: Events::with_capacity(config.initial_poll_capacity),
            slots: Vec::with_capacity(config.initial_poll_capacity),
            free: Vec::new(),
            dirty: true,
            wake,
            timers: TimerMap::new(),
            timer_callbacks: std::collections::HashMap::new(),
            config,
        }))))
    }

    /// Register a Selectable. Its interest mask is read lazily on the next
    /// rebuild, not at `add` time.
    pub fn add(&self, selectable: &Rc<dyn Selectable>) {
        let mut inner = self.0.borrow_mut();
        let idx = if let Some(idx) = inner.free.pop() {
            idx
        } else {
            inner.slots.push(None);
            inner.slots.len() - 1
        };
        inner.slots[idx] = Some(Slot {
            selectable: Rc::downgrade(selectable),
            registered: None,
        });
        inner.dirty = true;
        drop(inner);
        selectable.set_selector(Some(self.clone()));
        selectable.on_attach();
    }

    /// Deregister a previously-added Selectable. Idempotent: removing a
    /// Selectable that is not (or no longer) registered is a no-op.
    ///
    /// Takes a plain `&dyn Selectable` (matched by descriptor, which is
    /// unique per registered slot) rather than `&Rc<dyn Selectable>` so
    /// that a `Drop` impl — where the `Rc`'s strong count has already
    /// reached zero and no `Rc` can be reconstructed — can still deregister
    /// itself.
    pub fn remove(&self, selectable: &dyn Selectable) {
        let fd = selectable.raw_fd();
        let idx = {
            let inner = self.0.borrow();
            inner.slots.iter().position(|slot| {
                slot.as_ref()
                    .and_then(|s| s.selectable.upgrade())
                    .is_some_and(|rc| rc.raw_fd() == fd)
            })
        };
        let Some(idx) = idx else { return };
        selectable.on_detach();
        let mut inner = self.0.borrow_mut();
        if let Some(slot) = inner.slots[idx].take() {
            if slot.registered.is_some() {
                let _ = inner.poll.registry().deregister(&mut SourceFd(&fd));
            }
        }
        inner.free.push(idx);
        drop(inner);
        selectable.set_selector(None);
    }

    /// Mark the poll vector dirty because a Selectable's interest mask
    /// changed (e.g. a `beginWrite` just became pending).
    pub fn changed(&self, _selectable: &dyn Selectable) {
        self.0.borrow_mut().dirty = true;
    }

    /// Write one byte to the wake-pipe, causing the next (or in-progress)
    /// `poll` call to return. Safe to call from any thread holding a clone
    /// of this handle, though per §5 only `EventLoop`'s three entry points
    /// are expected to do so.
    pub fn wake(&self) {
        self.0.borrow().wake.wake();
    }

    /// A `Send + Sync` handle capable of waking this reactor from another
    /// thread without going through the (non-`Send`) `Reactor` handle
    /// itself. This is how `EventLoop::commit_event` reaches across
    /// threads: it holds a `WakeHandle` rather than a `Reactor`.
    pub fn wake_handle(&self) -> WakeHandle {
        WakeHandle(self.0.borrow().wake.write_fd)
    }

    /// Schedule `callback` to fire at `first_deadline` and, if `period` is
    /// non-zero, again every `period` thereafter. The callback runs on the
    /// reactor thread, from inside [`Self::wait_until`], once the timer's
    /// deadline has passed — matching `updateTimer`'s re-arming semantics
    /// in §4.D.
    pub fn schedule_timer(
        &self,
        first_deadline: Instant,
        period: Duration,
        callback: impl FnMut() + 'static,
    ) -> TimerId {
        let mut inner = self.0.borrow_mut();
        let id = inner.timers.insert(first_deadline, period);
        inner.timer_callbacks.insert(id, Box::new(callback));
        id
    }

    pub fn cancel_timer(&self, id: TimerId) {
        let mut inner = self.0.borrow_mut();
        inner.timers.remove(id);
        inner.timer_callbacks.remove(&id);
    }

    /// Convenience wrapper: wait up to `timeout` from now.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    /// Run exactly one poll pass, per §4.D's algorithm. `until = None` means
    /// wait indefinitely (bounded only by the configured
    /// `max_poll_interval` and any pending timer, so `wake()` remains
    /// responsive).
    pub fn wait_until(&self, until: Option<Instant>) -> Result<bool> {
        let now = Instant::now();

        // Step 1: any Selectable already Avail forces a zero timeout.
        let any_avail = {
            let inner = self.0.borrow();
            inner.slots.iter().any(|s| {
                s.as_ref()
                    .and_then(|s| s.selectable.upgrade())
                    .is_some_and(|rc| rc.avail())
            })
        };

        // Timer integration: fire anything already due, and fold the
        // earliest remaining deadline into the timeout computation.
        let mut fired_timers = Vec::new();
        let earliest_timer = {
            let mut inner = self.0.borrow_mut();
            inner.timers.update(now, |id| fired_timers.push(id))
        };

        if self.0.borrow().dirty {
            self.rebuild()?;
        }

        let max_interval = self.0.borrow().config.max_poll_interval;
        let mut deadline = until.unwrap_or(now + max_interval).min(now + max_interval);
        if let Some(t) = earliest_timer {
            deadline = deadline.min(t);
        }
        if any_avail {
            deadline = now;
        }
        let timeout = deadline.saturating_duration_since(now);

        let mut inner = self.0.borrow_mut();
        match inner.poll.poll(&mut inner.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }

        // Collect (slot, Rc<dyn Selectable>, readable, writable, errored)
        // tuples while the borrow is live, then drop the borrow before
        // invoking any callback so a handler may freely call
        // add/remove/changed/wake on this same reactor.
        let mut woke = false;
        let mut ready: Vec<(usize, Rc<dyn Selectable>, bool, bool, bool)> = Vec::new();
        for event in inner.events.iter() {
            if event.token() == WAKE_TOKEN {
                woke = true;
                continue;
            }
            let idx = event.token().0 - FIRST_DEVICE_TOKEN;
            let Some(Some(slot)) = inner.slots.get(idx) else {
                continue;
            };
            let Some(rc) = slot.selectable.upgrade() else {
                continue;
            };
            ready.push((
                idx,
                rc,
                event.is_readable(),
                event.is_writable(),
                event.is_error() || event.is_read_closed() || event.is_write_closed(),
            ));
        }
        drop(inner);

        if woke {
            self.0.borrow().wake.drain();
        }

        for id in fired_timers {
            // Take the callback out before invoking it so a callback that
            // cancels or re-schedules its own timer doesn't deadlock on the
            // RefCell, then put it back if the timer is still periodic.
            let callback = self.0.borrow_mut().timer_callbacks.remove(&id);
            if let Some(mut callback) = callback {
                callback();
                let mut inner = self.0.borrow_mut();
                if inner.timers.contains(id) {
                    inner.timer_callbacks.insert(id, callback);
                }
            }
        }

        let mut became_avail = any_avail;
        for (idx, selectable, readable, writable, errored) in ready {
            // Re-check presence between stages: a callback may have removed
            // this Selectable (or another one) from the slab.
            if errored && self.slot_present(idx) {
                selectable.dispatch_error(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "poll reported error/hangup",
                ));
            }
            if writable && self.slot_present(idx) {
                selectable.dispatch_writable();
            }
            if readable && self.slot_present(idx) {
                selectable.dispatch_readable();
            }
            if selectable.avail() {
                became_avail = true;
            }
        }

        Ok(became_avail)
    }

    fn slot_present(&self, idx: usize) -> bool {
        self.0
            .borrow()
            .slots
            .get(idx)
            .is_some_and(|s| s.is_some())
    }

    fn rebuild(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        let len = inner.slots.len();
        for idx in 0..len {
            let (fd, desired, was_registered) = {
                let Some(slot) = &inner.slots[idx] else {
                    continue;
                };
                let Some(rc) = slot.selectable.upgrade() else {
                    continue;
                };
                let desired = if rc.enabled() {
                    Some(rc.interest())
                } else {
                    None
                };
                (rc.raw_fd(), desired, slot.registered)
            };
            let token = Token(idx + FIRST_DEVICE_TOKEN);
            match (was_registered, desired) {
                (None, Some(interest)) => {
                    inner
                        .poll
                        .registry()
                        .register(&mut SourceFd(&fd), token, interest)
                        .map_err(|e| Error::System(format!("register failed: {e}")))?;
                    inner.slots[idx].as_mut().unwrap().registered = Some(interest);
                }
                (Some(old), Some(new)) if old != new => {
                    inner
                        .poll
                        .registry()
                        .reregister(&mut SourceFd(&fd), token, new)
                        .map_err(|e| Error::System(format!("reregister failed: {e}")))?;
                    inner.slots[idx].as_mut().unwrap().registered = Some(new);
                }
                (Some(_), None) => {
                    let _ = inner.poll.registry().deregister(&mut SourceFd(&fd));
                    inner.slots[idx].as_mut().unwrap().registered = None;
                }
                _ => {}
            }
        }
        inner.dirty = false;
        Ok(())
    }
}

impl AsRawFd for Reactor {
    /// The wake-pipe's read end, exposed for callers embedding this reactor
    /// inside another descriptor-based event loop.
    fn as_raw_fd(&self) -> RawFd {
        self.0.borrow().wake.read_fd
    }
}
