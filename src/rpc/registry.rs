// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `ServiceRegistry` (§4.I): maps `(domain, method)` to a type-erased
//! invoker. Grounded on the teacher's `rpc::registry`-shaped composite-key
//! `BTreeMap` of boxed handlers, generalized from the teacher's fixed
//! DDS-RPC method set to an open, runtime-registered one.

use std::collections::BTreeMap;

use crate::rpc::exception::RemoteException;
use crate::value::SerializationInfo;

use super::args::FromArgs;

/// A type-erased RPC method handler: given an already-decoded argument
/// array, runs the user's closure and encodes the result (or a structured
/// fault) back into a `SerializationInfo`.
pub trait Invoker {
    fn invoke(&self, args: &SerializationInfo) -> Result<SerializationInfo, RemoteException>;
}

impl<F> Invoker for F
where
    F: Fn(&SerializationInfo) -> Result<SerializationInfo, RemoteException>,
{
    fn invoke(&self, args: &SerializationInfo) -> Result<SerializationInfo, RemoteException> {
        self(args)
    }
}

/// Adapts a typed `Fn(A) -> Result<R, RemoteException>` closure into an
/// [`Invoker`] — the small generic shim §4.I calls for in place of the
/// original's compile-time template metaprogramming. Argument-decode
/// failures become a `RemoteException` rather than propagating into user
/// code, the same as any other malformed-request fault.
pub fn typed<A, R, F>(f: F) -> impl Invoker
where
    A: FromArgs + 'static,
    R: Into<SerializationInfo> + 'static,
    F: Fn(A) -> Result<R, RemoteException> + 'static,
{
    move |args: &SerializationInfo| -> Result<SerializationInfo, RemoteException> {
        let decoded = A::from_args(args).map_err(|e| RemoteException::new(e.to_string()))?;
        f(decoded).map(Into::into)
    }
}

/// Maps `(domain, method)` to a registered [`Invoker`] (§4.I; §9's Open
/// Question resolution: domain+method is the composite key, so the same
/// method name may be registered under distinct domains without conflict).
#[derive(Default)]
pub struct ServiceRegistry {
    methods: BTreeMap<(String, String), Box<dyn Invoker>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` under `domain` (empty string for the default
    /// domain). Registering under an already-occupied key replaces the
    /// previous entry.
    pub fn register_method(
        &mut self,
        domain: impl Into<String>,
        method: impl Into<String>,
        invoker: impl Invoker + 'static,
    ) {
        self.methods.insert((domain.into(), method.into()), Box::new(invoker));
    }

    pub fn dispatch(
        &self,
        domain: &str,
        method: &str,
        args: &SerializationInfo,
    ) -> Option<Result<SerializationInfo, RemoteException>> {
        self.methods
            .get(&(domain.to_string(), method.to_string()))
            .map(|invoker| invoker.invoke(args))
    }

    pub fn contains(&self, domain: &str, method: &str) -> bool {
        self.methods.contains_key(&(domain.to_string(), method.to_string()))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
