// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `FileDevice`: a regular-file backed [`IoDevice`].
//!
//! Regular files are always "ready" under `poll`, so a `FileDevice` is
//! mostly useful for the uniform blocking `read`/`write` API and for
//! standing in wherever an `IoDevice` is expected but the underlying
//! descriptor happens to be a file rather than a pipe or socket.

use std::path::Path;
use std::rc::Rc;

use crate::error::Result;

use super::device_impl::{IoDeviceImpl, OpenMode};
use super::facade::IoDevice;

pub struct FileDevice;

impl FileDevice {
    pub fn open(path: &Path, mode: OpenMode, inherit: bool) -> Result<Rc<IoDevice>> {
        let imp = IoDeviceImpl::open(path, mode, inherit)?;
        Ok(IoDevice::new(imp))
    }

    pub fn create(path: &Path, inherit: bool) -> Result<Rc<IoDevice>> {
        Self::open(
            path,
            OpenMode::READ | OpenMode::WRITE | OpenMode::CREATE | OpenMode::TRUNC,
            inherit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.txt");
        {
            let device = FileDevice::create(&path, false).unwrap();
            device.write(b"hello device").unwrap();
        }
        let device = FileDevice::open(&path, OpenMode::READ, false).unwrap();
        let mut buf = [0u8; 32];
        let (n, eof) = device.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello device");
        assert!(!eof);
    }
}
