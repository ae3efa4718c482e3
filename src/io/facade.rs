// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public [`IoDevice`] façade (§4.C): buffer ownership, the sync/async
//! state machine, and the `input_ready`/`output_ready` signals on top of
//! [`super::device_impl::IoDeviceImpl`].
//!
//! Buffers crossing a suspend point are modeled as owned `Vec<u8>` moved
//! into the device on `begin_read`/`begin_write` and moved back out on
//! `end_read`/`end_write`/`cancel`, rather than as a borrowed raw pointer —
//! the source toolkit's caller-owned-buffer contract translated into Rust
//! move semantics instead of aliasing a raw pointer across an await point.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use mio::Interest;

use crate::error::{Error, Result};
use crate::reactor::selectable::{Selectable, SelectableCell, State};
use crate::reactor::Reactor;

use super::device_impl::IoDeviceImpl;

struct PendingRead {
    buf: Vec<u8>,
    filled: usize,
}

struct PendingWrite {
    buf: Vec<u8>,
    sent: usize,
}

type Handler = Box<dyn Fn(&Rc<IoDevice>)>;

/// A byte-stream `Selectable` with uniform sync/async read/write semantics.
pub struct IoDevice {
    cell: SelectableCell,
    imp: RefCell<IoDeviceImpl>,
    read_op: RefCell<Option<PendingRead>>,
    write_op: RefCell<Option<PendingWrite>>,
    deferred_error: RefCell<Option<std::io::Error>>,
    timeout: std::cell::Cell<Option<Duration>>,
    self_ref: RefCell<std::rc::Weak<IoDevice>>,
    on_input_ready: RefCell<Option<Handler>>,
    on_output_ready: RefCell<Option<Handler>>,
}

impl IoDevice {
    pub fn new(imp: IoDeviceImpl) -> Rc<Self> {
        let fd = imp.fd();
        let device = Rc::new(Self {
            cell: SelectableCell::new(fd),
            imp: RefCell::new(imp),
            read_op: RefCell::new(None),
            write_op: RefCell::new(None),
            deferred_error: RefCell::new(None),
            timeout: std::cell::Cell::new(None),
            self_ref: RefCell::new(std::rc::Weak::new()),
            on_input_ready: RefCell::new(None),
            on_output_ready: RefCell::new(None),
        });
        *device.self_ref.borrow_mut() = Rc::downgrade(&device);
        device.cell.set_enabled(true);
        device
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.set(timeout);
    }

    pub fn set_input_ready_handler(&self, handler: impl Fn(&Rc<IoDevice>) + 'static) {
        *self.on_input_ready.borrow_mut() = Some(Box::new(handler));
    }

    pub fn set_output_ready_handler(&self, handler: impl Fn(&Rc<IoDevice>) + 'static) {
        *self.on_output_ready.borrow_mut() = Some(Box::new(handler));
    }

    fn self_rc(&self) -> Option<Rc<IoDevice>> {
        self.self_ref.borrow().upgrade()
    }

    fn take_deferred_error(&self) -> Result<()> {
        if let Some(err) = self.deferred_error.borrow_mut().take() {
            return Err(Error::Io(err));
        }
        Ok(())
    }

    /// Blocking read (§4.B). Fails with `IoPending` if an async read is
    /// already outstanding.
    pub fn read(&self, buf: &mut [u8]) -> Result<(usize, bool)> {
        if self.read_op.borrow().is_some() {
            return Err(Error::IoPending);
        }
        self.take_deferred_error()?;
        let mut eof = false;
        let n = self.imp.borrow().read(buf, self.timeout.get(), &mut eof)?;
        Ok((n, eof))
    }

    /// Blocking write, symmetric to `read`.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.write_op.borrow().is_some() {
            return Err(Error::IoPending);
        }
        self.take_deferred_error()?;
        self.imp.borrow().write(buf, self.timeout.get())
    }

    /// Async read attempt (§4.B/§4.C). Returns immediately with whatever
    /// was already available; the device becomes `Busy` (awaiting further
    /// reactor readiness) unless the attempt already saw EOF, in which case
    /// it is immediately `Avail`.
    pub fn begin_read(&self, buf: Vec<u8>) -> Result<usize> {
        if self.read_op.borrow().is_some() {
            return Err(Error::IoPending);
        }
        if self.cell.state() == State::Disabled {
            return Err(Error::Logic("begin_read on a disabled device"));
        }
        let mut owned = buf;
        let mut eof = false;
        let n = self.imp.borrow().begin_read(&mut owned, &mut eof)?;
        let immediate_complete = eof;
        *self.read_op.borrow_mut() = Some(PendingRead {
            buf: owned,
            filled: n,
        });
        self.cell
            .set_state(if immediate_complete { State::Avail } else { State::Busy });
        if let Some(selector) = self.cell.selector() {
            selector.changed(self);
        }
        Ok(n)
    }

    /// Complete an async read begun with `begin_read`: drops read-interest,
    /// then performs a blocking-or-poll read (bytes may already be
    /// available from the reactor's readiness notification), and returns
    /// the buffer, its total filled length, and whether EOF was observed.
    pub fn end_read(&self) -> Result<(Vec<u8>, usize, bool)> {
        let mut op = self
            .read_op
            .borrow_mut()
            .take()
            .ok_or(Error::Logic("end_read with no pending begin_read"))?;
        self.cell.set_state(State::Idle);
        self.take_deferred_error()?;
        if op.filled < op.buf.len() {
            let mut eof = false;
            let n = self
                .imp
                .borrow()
                .read(&mut op.buf[op.filled..], self.timeout.get(), &mut eof)?;
            op.filled += n;
            return Ok((op.buf, op.filled, eof));
        }
        Ok((op.buf, op.filled, false))
    }

    pub fn begin_write(&self, buf: Vec<u8>) -> Result<usize> {
        if self.write_op.borrow().is_some() {
            return Err(Error::IoPending);
        }
        let owned = buf;
        let n = self.imp.borrow().begin_write(&owned)?;
        let complete = n == owned.len();
        *self.write_op.borrow_mut() = Some(PendingWrite {
            buf: owned,
            sent: n,
        });
        self.cell
            .set_state(if complete { State::Avail } else { State::Busy });
        if let Some(selector) = self.cell.selector() {
            selector.changed(self);
        }
        Ok(n)
    }

    pub fn end_write(&self) -> Result<usize> {
        let mut op = self
            .write_op
            .borrow_mut()
            .take()
            .ok_or(Error::Logic("end_write with no pending begin_write"))?;
        self.cell.set_state(State::Idle);
        self.take_deferred_error()?;
        if op.sent < op.buf.len() {
            let n = self
                .imp
                .borrow()
                .write(&op.buf[op.sent..], self.timeout.get())?;
            op.sent += n;
        }
        Ok(op.sent)
    }

    /// Withdraw both interest bits and return to `Idle`; any in-flight
    /// `begin_read`/`begin_write` is abandoned with no callback.
    pub fn cancel(&self) {
        self.read_op.borrow_mut().take();
        self.write_op.borrow_mut().take();
        self.deferred_error.borrow_mut().take();
        self.cell.set_state(State::Idle);
    }

    pub fn raw_fd(&self) -> RawFd {
        self.cell.fd()
    }
}

impl Selectable for IoDevice {
    fn raw_fd(&self) -> RawFd {
        self.cell.fd()
    }

    fn interest(&self) -> Interest {
        let readable = self.read_op.borrow().is_some();
        let writable = self.write_op.borrow().is_some();
        match (readable, writable) {
            (true, true) => Interest::READABLE.add(Interest::WRITABLE),
            (true, false) => Interest::READABLE,
            (false, true) => Interest::WRITABLE,
            (false, false) => Interest::READABLE,
        }
    }

    fn state(&self) -> State {
        self.cell.state()
    }

    fn set_enabled(&self, enabled: bool) {
        self.cell.set_enabled(enabled);
    }

    fn enabled(&self) -> bool {
        self.cell.enabled()
    }

    fn avail(&self) -> bool {
        self.cell.avail()
    }

    fn selector(&self) -> Option<Reactor> {
        self.cell.selector()
    }

    fn set_selector(&self, selector: Option<Reactor>) {
        self.cell.set_selector(selector);
    }

    fn dispatch_error(&self, err: std::io::Error) {
        *self.deferred_error.borrow_mut() = Some(err);
    }

    fn dispatch_writable(&self) {
        if self.write_op.borrow().is_some() {
            self.cell.set_state(State::Avail);
            if let (Some(handler), Some(rc)) =
                (self.on_output_ready.borrow().as_ref(), self.self_rc())
            {
                handler(&rc);
            }
        }
    }

    fn dispatch_readable(&self) {
        if self.read_op.borrow().is_some() {
            self.cell.set_state(State::Avail);
            if let (Some(handler), Some(rc)) =
                (self.on_input_ready.borrow().as_ref(), self.self_rc())
            {
                handler(&rc);
            }
        }
    }
}

impl Drop for IoDevice {
    fn drop(&mut self) {
        if let Some(selector) = self.cell.selector() {
            selector.remove(self);
        }
    }
}
