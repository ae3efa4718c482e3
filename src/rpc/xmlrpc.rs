// SPDX-License-Identifier: Apache-2.0 OR MIT

//! XML-RPC `WireCodec` (§6): `<methodCall>`/`<methodResponse>` envelopes
//! wrapping the same `<value>` vocabulary `codec::xml` already knows how
//! to read and write.
//!
//! This wire form carries no length prefix of its own, so it is only
//! used framed by `transport::http`'s `Content-Length` — `try_decode`
//! therefore treats a fully-buffered slice as always a complete document,
//! same as `XmlCodec::decode`.

use crate::codec::xml::XmlCodec;
use crate::error::{Error, Result};
use crate::value::SerializationInfo;

use super::wire::{Message, WireCodec};

#[derive(Default)]
pub struct XmlRpcWire;

impl XmlRpcWire {
    pub fn new() -> Self {
        Self
    }
}

impl WireCodec for XmlRpcWire {
    fn encode_call(
        &self,
        method: &str,
        args: &SerializationInfo,
        _id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut xml = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
        xml.push_str(method);
        xml.push_str("</methodName><params>");
        for arg in args.iter_elements() {
            xml.push_str("<param>");
            XmlCodec::write_value(arg, &mut xml);
            xml.push_str("</param>");
        }
        xml.push_str("</params></methodCall>");
        out.extend_from_slice(xml.as_bytes());
        Ok(())
    }

    fn encode_response(
        &self,
        result: &SerializationInfo,
        _id: Option<i64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut xml = String::from("<?xml version=\"1.0\"?><methodResponse><params><param>");
        XmlCodec::write_value(result, &mut xml);
        xml.push_str("</param></params></methodResponse>");
        out.extend_from_slice(xml.as_bytes());
        Ok(())
    }

    fn encode_fault(&self, rc: i32, text: &str, _id: Option<i64>, out: &mut Vec<u8>) -> Result<()> {
        let mut fault = SerializationInfo::new_object();
        *fault.add_member("faultCode") = (rc as i64).into();
        *fault.add_member("faultString") = text.into();
        let mut xml = String::from("<?xml version=\"1.0\"?><methodResponse><fault>");
        XmlCodec::write_value(&fault, &mut xml);
        xml.push_str("</fault></methodResponse>");
        out.extend_from_slice(xml.as_bytes());
        Ok(())
    }

    fn try_decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| Error::Serialization(format!("invalid utf-8: {e}")))?;
        let doc = match roxmltree::Document::parse(text) {
            Ok(doc) => doc,
            Err(_) => return Ok(None),
        };
        let root = doc.root_element();
        match root.tag_name().name() {
            "methodCall" => {
                let method = root
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "methodName")
                    .and_then(|n| n.text())
                    .ok_or_else(|| Error::Serialization("methodCall missing methodName".into()))?
                    .to_string();
                let params = root
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "params")
                    .into_iter()
                    .flat_map(|p| p.children())
                    .filter(|n| n.is_element() && n.tag_name().name() == "param");
                let mut args = SerializationInfo::new_array();
                for param in params {
                    *args.add_element() = XmlCodec::read_value(param)?;
                }
                Ok(Some((Message::Call { id: None, method, args }, buf.len())))
            }
            "methodResponse" => {
                if let Some(fault) = root
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "fault")
                {
                    let value = XmlCodec::read_value(fault)?;
                    let rc = value.get_member("faultCode")?.to_i64()? as i32;
                    let text = value.get_member("faultString")?.to_string_value()?;
                    return Ok(Some((Message::Fault { id: None, rc, text }, buf.len())));
                }
                let param = root
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "params")
                    .and_then(|p| p.children().find(|n| n.is_element() && n.tag_name().name() == "param"))
                    .ok_or_else(|| Error::Serialization("methodResponse missing param".into()))?;
                let result = XmlCodec::read_value(param)?;
                Ok(Some((Message::Response { id: None, result }, buf.len())))
            }
            other => Err(Error::Serialization(format!("unexpected XML-RPC root <{other}>"))),
        }
    }

    fn content_type(&self) -> &'static str {
        "text/xml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips() {
        let wire = XmlRpcWire::new();
        let mut args = SerializationInfo::new_array();
        *args.add_element() = 6i32.into();
        *args.add_element() = "six".into();
        let mut bytes = Vec::new();
        wire.encode_call("multiply", &args, None, &mut bytes).unwrap();
        let (msg, consumed) = wire.try_decode(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        match msg {
            Message::Call { method, args, .. } => {
                assert_eq!(method, "multiply");
                assert_eq!(args.get_element(0).unwrap().to_i64().unwrap(), 6);
                assert_eq!(args.get_element(1).unwrap().to_string_value().unwrap(), "six");
            }
            _ => panic!("expected Call"),
        }
    }

    #[test]
    fn fault_round_trips() {
        let wire = XmlRpcWire::new();
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
    fn response_round_trips() {
        let wire = XmlRpcWire::new();
        let mut bytes = Vec::new();
        wire.encode_response(&42i64.into(), None, &mut bytes).unwrap();
        let (msg, _) = wire.try_decode(&bytes).unwrap().unwrap();
        match msg {
            Message::Response { result, .. } => assert_eq!(result.to_i64().unwrap(), 42),
            _ => panic!("expected Response"),
        }
    }
}
