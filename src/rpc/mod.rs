// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed, transport-pluggable RPC (§4.H, §4.I, §6, §7).
//!
//! `client`/`server` are the call-site and dispatch-site halves of the same
//! exchange, both built on `wire`'s [`wire::WireCodec`] abstraction so
//! either side can speak binary, JSON-RPC, or XML-RPC without caring which
//! `io::IoDevice`/`reactor::Reactor` is underneath.

pub mod args;
pub mod binary_wire;
pub mod client;
pub mod error;
pub mod exception;
pub mod registry;
pub mod server;
pub mod types;
pub mod wire;

#[cfg(feature = "json-rpc")]
pub mod jsonrpc;
#[cfg(feature = "xml-rpc")]
pub mod xmlrpc;

pub use args::{FromArgs, IntoArgs};
pub use binary_wire::BinaryWire;
pub use client::{PendingCall, RemoteClient, RemoteProcedure, RemoteProcedureVa, RemoteResult};
pub use error::{RpcError, RpcResult};
pub use exception::RemoteException;
pub use registry::{typed, Invoker, ServiceRegistry};
pub use server::{ServerExitHandle, ServiceServer};
pub use wire::{Message, WireCodec};

#[cfg(feature = "json-rpc")]
pub use jsonrpc::JsonRpcWire;
#[cfg(feature = "xml-rpc")]
pub use xmlrpc::XmlRpcWire;
