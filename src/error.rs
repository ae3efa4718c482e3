// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! side is the single [`Error`] enum below. The variants mirror the error
//! taxonomy of the toolkit: descriptor-level I/O failures, codec/conversion
//! failures, and peer-reported RPC faults.

use std::fmt;

/// Leaf reasons an `open()` can fail before any bytes are transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessFailure {
    /// The OS denied access to the path or descriptor.
    PermissionDenied,
    /// No such file, device, or directory.
    FileNotFound,
    /// The target device does not exist (e.g. a bad fd).
    DeviceNotFound,
    /// A parent directory component does not exist.
    DirectoryNotFound,
}

impl fmt::Display for AccessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::FileNotFound => write!(f, "file not found"),
            Self::DeviceNotFound => write!(f, "device not found"),
            Self::DirectoryNotFound => write!(f, "directory not found"),
        }
    }
}

/// Errors returned by this crate's reactor, I/O, serialization, and RPC APIs.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // I/O errors
    // ========================================================================
    /// Generic I/O error with an underlying OS cause.
    Io(std::io::Error),
    /// A blocking operation did not complete before its deadline.
    IoTimeout,
    /// A second async read or write was attempted while one was already pending.
    IoPending,
    /// `open()` failed before any bytes were transferred.
    AccessFailed(AccessFailure),

    // ========================================================================
    // Serialization errors
    // ========================================================================
    /// Malformed bytes, an unexpected token, or a bad dictionary index.
    Serialization(String),
    /// A `SerializationInfo` scalar coercion could not be performed losslessly.
    Conversion(String),

    // ========================================================================
    // RPC errors
    // ========================================================================
    /// The peer returned a structured fault.
    Remote(crate::rpc::exception::RemoteException),
    /// The named service or method does not exist on this registry.
    ServiceNotFound(String),

    // ========================================================================
    // Other errors
    // ========================================================================
    /// A non-I/O OS-level failure (e.g. a failed `poll` setup).
    System(String),
    /// Caller misuse the crate can detect cheaply but cannot recover from,
    /// e.g. issuing async I/O against a device opened in sync mode.
    Logic(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::IoTimeout => write!(f, "I/O operation timed out"),
            Error::IoPending => write!(f, "an async operation is already pending"),
            Error::AccessFailed(a) => write!(f, "access failed: {a}"),
            Error::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Error::Conversion(msg) => write!(f, "conversion error: {msg}"),
            Error::Remote(e) => write!(f, "remote exception: {e}"),
            Error::ServiceNotFound(name) => write!(f, "service not found: {name}"),
            Error::System(msg) => write!(f, "system error: {msg}"),
            Error::Logic(msg) => write!(f, "logic error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Error::IoTimeout,
            std::io::ErrorKind::PermissionDenied => {
                Error::AccessFailed(AccessFailure::PermissionDenied)
            }
            std::io::ErrorKind::NotFound => Error::AccessFailed(AccessFailure::FileNotFound),
            _ => Error::Io(e),
        }
    }
}

impl From<crate::rpc::exception::RemoteException> for Error {
    fn from(e: crate::rpc::exception::RemoteException) -> Self {
        Error::Remote(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
