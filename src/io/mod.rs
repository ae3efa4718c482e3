// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-blocking I/O devices: the descriptor-level primitives (§4.B) and the
//! public façade that layers buffer ownership and reactor signals on top
//! (§4.C).
//!
//! Grounded on the teacher's `transport::tcp::frame_codec` (incremental,
//! non-blocking read handling around `WouldBlock`/`Interrupted`) for the
//! read-loop shape, and on `core::rt::waitset` for the "device owns exactly
//! one descriptor, closed in `Drop`" resource discipline.

pub mod device_impl;
pub mod facade;
pub mod file;
pub mod pipe;
pub mod stdio;

pub use device_impl::{IoDeviceImpl, OpenMode};
pub use facade::IoDevice;
pub use file::FileDevice;
pub use pipe::{Pipe, PipeIoDevice};
pub use stdio::{stderr_device, stdin_device, stdout_device};
