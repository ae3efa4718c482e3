// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `WireCodec`: the common shape every RPC wire format (binary, JSON-RPC,
//! XML-RPC) implements, so `RemoteClient`/`ServiceServer` need not care
//! which wire format or transport a given connection speaks (§4.H is
//! "parametric in transport and codec").
//!
//! Distinct from [`crate::codec::Formatter`]/[`crate::codec::Parser`],
//! which only know how to turn a bare `SerializationInfo` into bytes and
//! back — a `WireCodec` additionally knows the method-name/call-id/fault
//! envelope every RPC message carries around that value.

use crate::error::Result;
use crate::value::SerializationInfo;

/// One decoded RPC message, independent of wire format.
pub enum Message {
    Call {
        id: Option<i64>,
        method: String,
        args: SerializationInfo,
    },
    Response {
        id: Option<i64>,
        result: SerializationInfo,
    },
    Fault {
        id: Option<i64>,
        rc: i32,
        text: String,
    },
}

pub trait WireCodec {
    fn encode_call(
        &self,
        method: &str,
        args: &SerializationInfo,
        id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()>;

    fn encode_response(
        &self,
        result: &SerializationInfo,
        id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()>;

    fn encode_fault(&self, rc: i32, text: &str, id: Option<i64>, out: &mut Vec<u8>) -> Result<()>;

    /// Attempt to decode exactly one message from the front of `buf`.
    /// `Ok(None)` means "not enough bytes yet", matching
    /// `rpc::types::try_decode_frame`'s incremental contract.
    fn try_decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>>;

    /// MIME type an HTTP-framed transport should advertise for this wire
    /// form's encoded bytes. Only consulted when a `RemoteClient`/
    /// `ServiceServer` is constructed over `transport::http`.
    fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }
}
