// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `Pipe` and `PipeIoDevice`: one end of a process-style pipe (§4.C).

use std::os::unix::io::RawFd;
use std::rc::Rc;

use crate::error::{Error, Result};

use super::device_impl::IoDeviceImpl;
use super::facade::IoDevice;

/// A single end of an OS pipe, exposed as an [`IoDevice`].
pub struct PipeIoDevice {
    device: Rc<IoDevice>,
}

impl PipeIoDevice {
    fn from_fd(fd: RawFd, async_mode: bool, inherit: bool) -> Result<Self> {
        let imp = IoDeviceImpl::open_fd(fd, async_mode, inherit)?;
        Ok(Self {
            device: IoDevice::new(imp),
        })
    }

    pub fn device(&self) -> &Rc<IoDevice> {
        &self.device
    }

    /// `dup2` this end onto `target`, optionally closing the original
    /// descriptor afterwards (used to wire a child process's stdio onto a
    /// pipe end before `exec`).
    pub fn redirect(&self, target: RawFd, close_original: bool) -> Result<()> {
        let fd = self.device.raw_fd();
        // SAFETY: fd and target are both valid descriptor values; dup2
        // itself validates them at the OS level.
        let rc = unsafe { libc::dup2(fd, target) };
        if rc < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        if close_original {
            // SAFETY: fd was just duplicated onto target; closing the
            // original is safe and intentional.
            unsafe {
                libc::close(fd);
            }
        }
        Ok(())
    }
}

/// A connected pair of pipe ends.
pub struct Pipe {
    read_end: PipeIoDevice,
    write_end: PipeIoDevice,
}

impl Pipe {
    pub fn new(async_mode: bool, inherit: bool) -> Result<Self> {
        let mut fds = [0i32; 2];
        let mut flags = 0;
        if async_mode {
            flags |= libc::O_NONBLOCK;
        }
        if !inherit {
            flags |= libc::O_CLOEXEC;
        }
        // SAFETY: fds is a valid 2-element buffer.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
        if rc != 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(Self {
            read_end: PipeIoDevice::from_fd(fds[0], async_mode, inherit)?,
            write_end: PipeIoDevice::from_fd(fds[1], async_mode, inherit)?,
        })
    }

    /// The read end (what §3 calls `out()` — data flows *out* of the pipe
    /// here).
    pub fn out_end(&self) -> &PipeIoDevice {
        &self.read_end
    }

    /// The write end (`in()` — data flows *in* to the pipe here).
    pub fn in_end(&self) -> &PipeIoDevice {
        &self.write_end
    }

    pub fn redirect_stdin(&self) -> Result<()> {
        self.read_end.redirect(libc::STDIN_FILENO, true)
    }

    pub fn redirect_stdout(&self) -> Result<()> {
        self.write_end.redirect(libc::STDOUT_FILENO, true)
    }

    pub fn redirect_stderr(&self) -> Result<()> {
        self.write_end.redirect(libc::STDERR_FILENO, true)
    }
}
