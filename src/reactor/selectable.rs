// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Selectable`] capability and its state machine.
//!
//! The source toolkit models "participates in the reactor" and "is a byte
//! stream" as two steps of a single inheritance chain (`Selectable` →
//! `IODevice` → `PipeIODevice`). Per the design notes this implementation
//! keeps them as two small, composable pieces instead: [`Selectable`] is the
//! readiness-source capability a [`super::Reactor`] can monitor, and
//! `IODevice` (see [`crate::io`]) *holds* a [`SelectableState`] rather than
//! inheriting from it.

use std::cell::Cell;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};

use mio::Interest;

use super::Reactor;

/// One of the four states an [`Selectable`] can occupy, per §3's state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not monitored by the reactor at all.
    Disabled,
    /// Monitored, no operation pending, no readiness observed.
    Idle,
    /// An async `beginRead`/`beginWrite` is outstanding.
    Busy,
    /// The reactor observed readiness (or EOF) matching a pending operation.
    Avail,
}

/// Shared state bookkeeping embedded (by composition) in every concrete
/// readiness source. Tracks the four-state machine of §3 and the
/// back-pointer to the owning reactor; does not itself know how to perform
/// I/O.
pub struct SelectableCell {
    state: Cell<State>,
    selector: std::cell::RefCell<Option<Reactor>>,
    fd: RawFd,
}

impl SelectableCell {
    /// Construct a new cell, initially `Disabled`, for the given descriptor.
    pub fn new(fd: RawFd) -> Self {
        Self {
            state: Cell::new(State::Disabled),
            selector: std::cell::RefCell::new(None),
            fd,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn set_state(&self, state: State) {
        self.state.set(state);
    }

    pub fn enabled(&self) -> bool {
        !matches!(self.state.get(), State::Disabled)
    }

    pub fn avail(&self) -> bool {
        matches!(self.state.get(), State::Avail)
    }

    /// Transition `Disabled <-> Idle`. Enabling a device already in a
    /// non-Disabled state is a no-op; disabling one with a pending op
    /// forcibly returns it to `Disabled` (the pending op is abandoned, as
    /// for `cancel`).
    pub fn set_enabled(&self, enabled: bool) {
        match (enabled, self.state.get()) {
            (true, State::Disabled) => self.state.set(State::Idle),
            (false, State::Disabled) => {}
            (false, _) => self.state.set(State::Disabled),
            (true, _) => {}
        }
    }

    pub fn selector(&self) -> Option<Reactor> {
        self.selector.borrow().clone()
    }

    pub fn set_selector(&self, selector: Option<Reactor>) {
        *self.selector.borrow_mut() = selector;
    }
}

/// A readiness source a [`super::Reactor`] can monitor.
///
/// Implementors contribute one descriptor and an interest mask; the reactor
/// invokes [`Selectable::dispatch_error`], [`Selectable::dispatch_writable`],
/// and [`Selectable::dispatch_readable`] (in that order, per §5's ordering
/// rule) whenever `poll` reports matching readiness. An implementor's `Drop`
/// must call `deregister` on its current selector, mirroring the source's
/// rule that a Selectable's destructor deregisters it from its reactor.
pub trait Selectable {
    /// The raw OS descriptor this Selectable contributes to the poll set.
    fn raw_fd(&self) -> RawFd;

    /// The interest mask this Selectable currently wants monitored. Called
    /// each time the reactor's poll vector is rebuilt (i.e. whenever
    /// `changed` was called since the last rebuild).
    fn interest(&self) -> Interest;

    fn state(&self) -> State;
    fn set_enabled(&self, enabled: bool);
    fn enabled(&self) -> bool;
    fn avail(&self) -> bool;

    fn selector(&self) -> Option<Reactor>;
    fn set_selector(&self, selector: Option<Reactor>);

    /// Invoked by the reactor immediately after registration.
    fn on_attach(&self) {}
    /// Invoked by the reactor immediately before deregistration.
    fn on_detach(&self) {}

    /// Fired when `poll` reports `POLLERR`/`POLLHUP`/`POLLNVAL` for this
    /// descriptor. Fires before `dispatch_writable`/`dispatch_readable`.
    fn dispatch_error(&self, err: std::io::Error);
    /// Fired when `poll` reports the descriptor writable.
    fn dispatch_writable(&self);
    /// Fired when `poll` reports the descriptor readable (or at EOF).
    fn dispatch_readable(&self);
}

/// A non-owning, cheaply-clonable reference to something implementing
/// [`Selectable`], used by [`super::Reactor`]'s internal slab so that the
/// reactor never extends a Selectable's lifetime (per §3: "non-owning
/// Selectable pointers").
pub type SelectableRef = Weak<dyn Selectable>;

/// Upgrade helper mirroring the common call pattern at dispatch sites.
pub(crate) fn upgrade(weak: &SelectableRef) -> Option<Rc<dyn Selectable>> {
    weak.upgrade()
}
