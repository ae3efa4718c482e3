// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Descriptor-level non-blocking primitives (§4.B).
//!
//! This is the layer that actually calls into libc. It knows nothing about
//! the reactor or about buffer lifetimes beyond the single call it is
//! asked to perform; [`super::facade::IoDevice`] is the layer that owns
//! buffers across suspend points.

use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use crate::error::{AccessFailure, Error, Result};

bitflags::bitflags! {
    /// Bit-set passed to [`IoDeviceImpl::open`], mirroring §4.B.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        const SYNC = 1 << 0;
        const ASYNC = 1 << 1;
        const READ = 1 << 2;
        const WRITE = 1 << 3;
        const AT_END = 1 << 4;
        const APPEND = 1 << 5;
        const TRUNC = 1 << 6;
        const CREATE = 1 << 7;
    }
}

/// Owns exactly one OS descriptor and the non-blocking primitives over it.
pub struct IoDeviceImpl {
    fd: RawFd,
    async_mode: bool,
    open: bool,
}

impl IoDeviceImpl {
    /// Open a filesystem path per §4.B. `inherit=false` requests
    /// close-on-exec.
    pub fn open(path: &std::path::Path, mode: OpenMode, inherit: bool) -> Result<Self> {
        let mut flags = 0;
        match (mode.contains(OpenMode::READ), mode.contains(OpenMode::WRITE)) {
            (true, true) => flags |= libc::O_RDWR,
            (true, false) => flags |= libc::O_RDONLY,
            (false, true) => flags |= libc::O_WRONLY,
            (false, false) => flags |= libc::O_RDONLY,
        }
        if mode.contains(OpenMode::CREATE) {
            flags |= libc::O_CREAT;
        }
        if mode.contains(OpenMode::TRUNC) {
            flags |= libc::O_TRUNC;
        }
        if mode.contains(OpenMode::APPEND) {
            flags |= libc::O_APPEND;
        }
        if mode.contains(OpenMode::ASYNC) {
            flags |= libc::O_NONBLOCK;
        }
        if !inherit {
            flags |= libc::O_CLOEXEC;
        }

        let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|_| Error::Logic("path contains an interior NUL byte"))?;
        // SAFETY: c_path is NUL-terminated and lives for the duration of
        // the call; 0o666 is the standard permission bits subject to umask.
        let fd = unsafe { libc::open(c_path.as_ptr(), flags, 0o666) };
        if fd < 0 {
            return Err(Self::classify_open_error());
        }
        if mode.contains(OpenMode::AT_END) {
            // SAFETY: fd was just validated above.
            unsafe {
                libc::lseek(fd, 0, libc::SEEK_END);
            }
        }
        Ok(Self {
            fd,
            async_mode: mode.contains(OpenMode::ASYNC),
            open: true,
        })
    }

    /// Adopt an existing descriptor, applying the same non-blocking /
    /// close-on-exec handling `open` would.
    pub fn open_fd(fd: RawFd, async_mode: bool, inherit: bool) -> Result<Self> {
        // SAFETY: caller guarantees `fd` is a valid, open descriptor they
        // are transferring ownership of to this `IoDeviceImpl`.
        unsafe {
            let mut flags = libc::fcntl(fd, libc::F_GETFL, 0);
            if async_mode {
                flags |= libc::O_NONBLOCK;
            }
            libc::fcntl(fd, libc::F_SETFL, flags);
            if !inherit {
                let fdflags = libc::fcntl(fd, libc::F_GETFD, 0);
                libc::fcntl(fd, libc::F_SETFD, fdflags | libc::FD_CLOEXEC);
            }
        }
        Ok(Self {
            fd,
            async_mode,
            open: true,
        })
    }

    fn classify_open_error() -> Error {
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EACCES) => Error::AccessFailed(AccessFailure::PermissionDenied),
            Some(libc::ENOENT) => Error::AccessFailed(AccessFailure::FileNotFound),
            Some(libc::ENOTDIR) => Error::AccessFailed(AccessFailure::DirectoryNotFound),
            Some(libc::EBADF) => Error::AccessFailed(AccessFailure::DeviceNotFound),
            _ => Error::Io(err),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_async(&self) -> bool {
        self.async_mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Idempotent close.
    pub fn close(&mut self) {
        if self.open {
            // SAFETY: fd is owned by this struct and not yet closed.
            unsafe {
                libc::close(self.fd);
            }
            self.open = false;
        }
    }

    /// Blocking read per §4.B: loops past `EINTR`, waits via `poll` on
    /// `EAGAIN` up to `timeout`, reports `eof` on a zero-length read or
    /// `ECONNRESET`.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>, eof: &mut bool) -> Result<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            // SAFETY: buf is a valid, writable slice for its length.
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n >= 0 {
                *eof = n == 0;
                return Ok(n as usize);
            }
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ECONNRESET) => {
                    *eof = true;
                    return Ok(0);
                }
                Some(libc::EAGAIN) if self.async_mode => {
                    self.wait_readable(Self::remaining(deadline)?)?;
                }
                _ => return Err(Error::Io(err)),
            }
        }
    }

    /// Async attempt: a single non-blocking read, returning immediately
    /// with whatever is already available (possibly zero bytes).
    pub fn begin_read(&self, buf: &mut [u8], eof: &mut bool) -> Result<usize> {
        // SAFETY: buf is a valid, writable slice for its length.
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            *eof = n == 0;
            return Ok(n as usize);
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) => Ok(0),
            Some(libc::ECONNRESET) => {
                *eof = true;
                Ok(0)
            }
            _ => Err(Error::Io(err)),
        }
    }

    /// Write side, symmetric to `read`.
    pub fn write(&self, buf: &[u8], timeout: Option<Duration>) -> Result<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            // SAFETY: buf is a valid, readable slice for its length.
            let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) if self.async_mode => {
                    self.wait_writable(Self::remaining(deadline)?)?;
                }
                _ => return Err(Error::Io(err)),
            }
        }
    }

    pub fn begin_write(&self, buf: &[u8]) -> Result<usize> {
        // SAFETY: buf is a valid, readable slice for its length.
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) => Ok(0),
            _ => Err(Error::Io(err)),
        }
    }

    /// Single-descriptor `poll` convenience for synchronous callers.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        self.wait_readable(Some(timeout))
    }

    fn wait_readable(&self, timeout: Option<Duration>) -> Result<()> {
        self.wait_for(libc::POLLIN, timeout)
    }

    fn wait_writable(&self, timeout: Option<Duration>) -> Result<()> {
        self.wait_for(libc::POLLOUT, timeout)
    }

    fn wait_for(&self, events: i16, timeout: Option<Duration>) -> Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events,
            revents: 0,
        };
        let millis = match timeout {
            Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        };
        loop {
            // SAFETY: pfd is a single valid pollfd on the stack.
            let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(Error::Io(err));
            }
            if rc == 0 {
                return Err(Error::IoTimeout);
            }
            return Ok(());
        }
    }

    fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>> {
        match deadline {
            None => Ok(None),
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    Err(Error::IoTimeout)
                } else {
                    Ok(Some(d - now))
                }
            }
        }
    }
}

impl Drop for IoDeviceImpl {
    fn drop(&mut self) {
        self.close();
    }
}
