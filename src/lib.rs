// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # conduit-rt
//!
//! A single-threaded, descriptor-multiplexing event reactor paired with a
//! typed, transport-pluggable RPC framework.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                        rpc (client/server)                    |
//! |   RemoteClient | ServiceServer | ServiceRegistry | RpcError    |
//! +---------------------------------------------------------------+
//! |         codec (binary | json | xml | properties)               |
//! |             Formatter / Parser over SerializationInfo          |
//! +---------------------------------------------------------------+
//! |     transport (stream / http)      |       value (SerializationInfo) |
//! +---------------------------------------------------------------+
//! |            io (IoDevice, FileDevice, Pipe, stdio)               |
//! +---------------------------------------------------------------+
//! |        reactor (Selectable, Reactor, TimerMap)                 |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`reactor::Reactor`] | Poll-based multiplexer over registered [`reactor::Selectable`]s |
//! | [`io::IoDevice`] | Non-blocking descriptor façade with async begin/end read-write |
//! | [`value::SerializationInfo`] | Dynamically typed value tree every codec travels through |
//! | [`event_loop::EventLoop`] | Reactor plus a cross-thread commit queue and timers |
//! | [`rpc::client::RemoteClient`] | Typed synchronous/asynchronous RPC call site |
//! | [`rpc::server::ServiceServer`] | Dispatches incoming requests to registered handlers |

pub mod codec;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod io;
pub mod reactor;
pub mod rpc;
pub mod transport;
pub mod util;
pub mod value;

pub use error::{Error, Result};
pub use event_loop::EventLoop;
pub use io::{FileDevice, IoDevice, OpenMode, Pipe, PipeIoDevice};
pub use reactor::{Reactor, Selectable, State};
pub use value::{Category, Scalar, SerializationInfo};
