// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON-RPC 2.0 `WireCodec` (§6): `{jsonrpc:"2.0", method, params, id}`
//! requests; `{jsonrpc:"2.0", result|error, id}` responses.
//!
//! Each encoded message is a single JSON document with no framing of its
//! own — a connection speaking this wire form directly over TCP relies on
//! `serde_json`'s streaming deserializer (via its reported `byte_offset`)
//! to find message boundaries, the same trick `codec::json::JsonCodec`
//! already uses; one embedded in `transport::http` instead relies on
//! `Content-Length`.

use serde_json::{json, Value};

use crate::codec::json::JsonCodec;
use crate::error::{Error, Result};
use crate::value::SerializationInfo;

use super::wire::{Message, WireCodec};

#[derive(Default)]
pub struct JsonRpcWire;

impl JsonRpcWire {
    pub fn new() -> Self {
        Self
    }
}

impl WireCodec for JsonRpcWire {
    fn encode_call(
        &self,
        method: &str,
        args: &SerializationInfo,
        id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let doc = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": JsonCodec::to_json(args),
            "id": id.unwrap_or(0),
        });
        serde_json::to_writer(out, &doc)
            .map_err(|e| Error::Serialization(format!("json-rpc encode failed: {e}")))
    }

    fn encode_response(
        &self,
        result: &SerializationInfo,
        id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let doc = json!({
            "jsonrpc": "2.0",
            "result": JsonCodec::to_json(result),
            "id": id.unwrap_or(0),
        });
        serde_json::to_writer(out, &doc)
            .map_err(|e| Error::Serialization(format!("json-rpc encode failed: {e}")))
    }

    fn encode_fault(&self, rc: i32, text: &str, id: Option<i64>, out: &mut Vec<u8>) -> Result<()> {
        let doc = json!({
            "jsonrpc": "2.0",
            "error": { "code": rc, "message": text },
            "id": id.unwrap_or(0),
        });
        serde_json::to_writer(out, &doc)
            .map_err(|e| Error::Serialization(format!("json-rpc encode failed: {e}")))
    }

    fn try_decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>> {
        let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(v)) => v,
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => return Err(Error::Serialization(format!("json-rpc decode failed: {e}"))),
            None => return Ok(None),
        };
        let consumed = stream.byte_offset();
        let id = value.get("id").and_then(Value::as_i64);

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let params = value.get("params").cloned().unwrap_or(Value::Array(Vec::new()));
            return Ok(Some((
                Message::Call { id, method: method.to_string(), args: JsonCodec::from_json(&params) },
                consumed,
            )));
        }
        if let Some(error) = value.get("error") {
            let rc = error.get("code").and_then(Value::as_i64).unwrap_or(0) as i32;
            let text = error.get("message").and_then(Value::as_str).unwrap_or("").to_string();
            return Ok(Some((Message::Fault { id, rc, text }, consumed)));
        }
        let result = value.get("result").cloned().unwrap_or(Value::Null);
        Ok(Some((Message::Response { id, result: JsonCodec::from_json(&result) }, consumed)))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips() {
        let wire = JsonRpcWire::new();
        let mut args = SerializationInfo::new_array();
        *args.add_element() = 6i32.into();
        let mut bytes = Vec::new();
        wire.encode_call("multiply", &args, Some(1), &mut bytes).unwrap();
        let (msg, consumed) = wire.try_decode(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        match msg {
            Message::Call { method, id, .. } => {
                assert_eq!(method, "multiply");
                assert_eq!(id, Some(1));
            }
            _ => panic!("expected Call"),
        }
    }

    #[test]
    fn fault_round_trips() {
        let wire = JsonRpcWire::new();
        let mut bytes = Vec::new();
        wire.encode_fault(7, "Fault", Some(2), &mut bytes).unwrap();
        let (msg, _) = wire.try_decode(&bytes).unwrap().unwrap();
        match msg {
            Message::Fault { rc, text, .. } => {
                assert_eq!(rc, 7);
                assert_eq!(text, "Fault");
            }
            _ => panic!("expected Fault"),
        }
    }

    #[test]
    fn response_round_trips() {
        let wire = JsonRpcWire::new();
        let mut bytes = Vec::new();
        wire.encode_response(&42i64.into(), Some(3), &mut bytes).unwrap();
        let (msg, _) = wire.try_decode(&bytes).unwrap().unwrap();
        match msg {
            Message::Response { result, id } => {
                assert_eq!(result.to_i64().unwrap(), 42);
                assert_eq!(id, Some(3));
            }
            _ => panic!("expected Response"),
        }
    }
}
