// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RPC-specific error type (§4.H, §7).
//!
//! Wraps [`crate::error::Error`] the same way the teacher's
//! `rpc::error::RpcError` wraps `dds::Error`: the RPC layer adds a couple
//! of call-site-specific variants (service/method lookup failures,
//! decoding a result into the caller's expected type) on top of the
//! crate-wide taxonomy, rather than duplicating it.

use std::fmt;

use crate::error::Error;
use crate::rpc::exception::RemoteException;

/// Result type for RPC client/server operations.
pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug)]
pub enum RpcError {
    /// The peer returned a structured fault.
    Remote(RemoteException),
    /// Transport-level failure (includes `Error::IoTimeout`).
    Transport(Error),
    /// A result or argument `SerializationInfo` could not be decoded into
    /// the caller's expected type.
    Conversion(String),
    /// No invoker registered under the requested `(domain, method)` key.
    MethodNotFound { domain: String, method: String },
}

impl RpcError {
    pub fn method_not_found(domain: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            domain: domain.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(e) => write!(f, "remote exception: {e}"),
            Self::Transport(e) => write!(f, "RPC transport error: {e}"),
            Self::Conversion(msg) => write!(f, "RPC conversion error: {msg}"),
            Self::MethodNotFound { domain, method } => {
                if domain.is_empty() {
                    write!(f, "method not found: {method}")
                } else {
                    write!(f, "method not found: {domain}::{method}")
                }
            }
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Remote(e) => Some(e),
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for RpcError {
    fn from(e: Error) -> Self {
        match e {
            Error::Remote(re) => Self::Remote(re),
            Error::Conversion(msg) => Self::Conversion(msg),
            Error::ServiceNotFound(name) => Self::method_not_found("", name),
            other => Self::Transport(other),
        }
    }
}

impl From<RemoteException> for RpcError {
    fn from(e: RemoteException) -> Self {
        Self::Remote(e)
    }
}
