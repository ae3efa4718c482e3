// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transport-layer glue (§6): turning a connected byte stream into a peer
//! a [`crate::rpc::client::RemoteClient`] or
//! [`crate::rpc::server::ServiceServer`] can read/write RPC frames over.
//!
//! `stream` carries the plain wire forms (binary, JSON-over-TCP) directly
//! on a socket adopted as an [`crate::io::IoDevice`]; `http` adds
//! HTTP/1.1 request/response framing around a codec's body bytes for
//! JSON-RPC-over-HTTP and XML-RPC. Transport is a type choice made at
//! construction time (which device/codec a `RemoteClient` is built with),
//! not a runtime flag threaded through every call.

pub mod http;
pub mod stream;

pub use stream::{TcpListener, TcpStream};
