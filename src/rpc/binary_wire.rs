// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The binary `WireCodec` (§6): maps [`Message`] onto the frame shape of
//! [`super::types`] — a `Call` body is a 2-element array `[method, args]`
//! (matching `types::tests::frame_round_trips`'s own convention), a
//! `Response` body is the bare result value, and a `Fault` body is an
//! `{rc, text}` object.

use crate::codec::binary::BinaryCodec;
use crate::error::{Error, Result};
use crate::value::SerializationInfo;

use super::types::{encode_frame, try_decode_frame, Frame, MessageKind};
use super::wire::{Message, WireCodec};

/// Owns the connection's `BinaryCodec`, whose string dictionary is shared
/// across every frame sent on it (§5's resource policy), so a `BinaryWire`
/// cannot be shared between connections.
pub struct BinaryWire {
    codec: BinaryCodec,
}

impl BinaryWire {
    pub fn new() -> Self {
        Self { codec: BinaryCodec::new() }
    }
}

impl Default for BinaryWire {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec for BinaryWire {
    fn encode_call(
        &self,
        method: &str,
        args: &SerializationInfo,
        _id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut body = SerializationInfo::new_array();
        *body.add_element() = method.into();
        *body.add_element() = args.clone();
        encode_frame(MessageKind::Call, &body, &self.codec, out)
    }

    fn encode_response(
        &self,
        result: &SerializationInfo,
        _id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        encode_frame(MessageKind::Response, result, &self.codec, out)
    }

    fn encode_fault(&self, rc: i32, text: &str, _id: Option<i64>, out: &mut Vec<u8>) -> Result<()> {
        let mut body = SerializationInfo::new_object();
        *body.add_member("rc") = (rc as i64).into();
        *body.add_member("text") = text.into();
        encode_frame(MessageKind::Fault, &body, &self.codec, out)
    }

    fn try_decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>> {
        let Some((Frame { kind, body }, consumed)) = try_decode_frame(buf, &self.codec)? else {
            return Ok(None);
        };
        let message = match kind {
            MessageKind::Call => {
                let method = body.get_element(0)?.to_string_value()?;
                let args = body.get_element(1)?.clone();
                Message::Call { id: None, method, args }
            }
            MessageKind::Response => Message::Response { id: None, result: body },
            MessageKind::Fault => {
                let rc = body.get_member("rc")?.to_i64()? as i32;
                let text = body.get_member("text")?.to_string_value()?;
                Message::Fault { id: None, rc, text }
            }
            MessageKind::DomainPrefix => {
                return Err(Error::Serialization("unexpected domain-prefix frame".into()));
            }
        };
        Ok(Some((message, consumed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips_through_the_wire_codec() {
        let wire = BinaryWire::new();
        let mut args = SerializationInfo::new_array();
        *args.add_element() = 6i32.into();
        let mut bytes = Vec::new();
        wire.encode_call("multiply", &args, None, &mut bytes).unwrap();
        let (msg, consumed) = wire.try_decode(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        match msg {
            Message::Call { method, args, .. } => {
                assert_eq!(method, "multiply");
                assert_eq!(args.get_element(0).unwrap().to_i64().unwrap(), 6);
            }
            _ => panic!("expected Call"),
        }
    }

    #[test]
    fn fault_round_trips() {
        let wire = BinaryWire::new();
        let mut bytes = Vec::new();
        wire.encode_fault(7, "no such method", None, &mut bytes).unwrap();
        let (msg, _) = wire.try_decode(&bytes).unwrap().unwrap();
        match msg {
            Message::Fault { rc, text, .. } => {
                assert_eq!(rc, 7);
                assert_eq!(text, "no such method");
            }
            _ => panic!("expected Fault"),
        }
    }

    #[test]
    fn incomplete_bytes_report_none() {
        let wire = BinaryWire::new();
        let mut args = SerializationInfo::new_array();
        *args.add_element() = 1i32.into();
        let mut bytes = Vec::new();
        wire.encode_call("ping", &args, None, &mut bytes).unwrap();
        assert!(wire.try_decode(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }
}
