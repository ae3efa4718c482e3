// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Devices adopting the three reserved standard descriptors.

use std::rc::Rc;

use crate::error::Result;

use super::device_impl::IoDeviceImpl;
use super::facade::IoDevice;

/// Adopt file descriptor 0 as an [`IoDevice`]. `inherit=true` since stdin is
/// typically meant to survive an `exec`.
pub fn stdin_device(async_mode: bool) -> Result<Rc<IoDevice>> {
    let imp = IoDeviceImpl::open_fd(libc::STDIN_FILENO, async_mode, true)?;
    Ok(IoDevice::new(imp))
}

pub fn stdout_device(async_mode: bool) -> Result<Rc<IoDevice>> {
    let imp = IoDeviceImpl::open_fd(libc::STDOUT_FILENO, async_mode, true)?;
    Ok(IoDevice::new(imp))
}

pub fn stderr_device(async_mode: bool) -> Result<Rc<IoDevice>> {
    let imp = IoDeviceImpl::open_fd(libc::STDERR_FILENO, async_mode, true)?;
    Ok(IoDevice::new(imp))
}
