// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The XML codec (§4.G/§6, non-normative): a `SerializationInfo` mapping
//! onto the familiar XML-RPC `<value>` vocabulary (`<struct>`, `<array>`,
//! `<string>`, `<i8>`, `<double>`, `<boolean>`, `<nil/>`), used both for
//! bare XML documents and as the payload of the XML-RPC wire form.
//!
//! Reading uses `roxmltree`'s non-owning DOM (grounded in the teacher's
//! preference for borrow-over-owned parsing wherever the input outlives
//! the parse); writing is a small hand-rolled streaming writer, since
//! `roxmltree` is read-only.

use crate::error::{Error, Result};
use crate::value::{Category, Scalar, SerializationInfo};

use super::{Formatter, Parser};

pub struct XmlCodec;

impl XmlCodec {
    pub fn new() -> Self {
        Self
    }

    /// Exposed `pub(crate)` (rather than private) so `rpc::xmlrpc` can
    /// reuse the same `<value>` vocabulary inside a `<methodCall>`/
    /// `<methodResponse>` envelope instead of duplicating it.
    pub(crate) fn write_value(value: &SerializationInfo, out: &mut String) {
        out.push_str("<value>");
        match value.category() {
            Category::Void => out.push_str("<nil/>"),
            Category::Value => match value.scalar() {
                Scalar::Null => out.push_str("<nil/>"),
                Scalar::Bool(b) => {
                    out.push_str("<boolean>");
                    out.push_str(if *b { "1" } else { "0" });
                    out.push_str("</boolean>");
                }
                Scalar::Int(v) => {
                    out.push_str("<i8>");
                    out.push_str(&v.to_string());
                    out.push_str("</i8>");
                }
                Scalar::UInt(v) => {
                    out.push_str("<i8>");
                    out.push_str(&v.to_string());
                    out.push_str("</i8>");
                }
                Scalar::Float(v) => {
                    out.push_str("<double>");
                    out.push_str(&v.to_string());
                    out.push_str("</double>");
                }
                Scalar::Str(s) | Scalar::WStr(s) => {
                    out.push_str("<string>");
                    escape_into(s, out);
                    out.push_str("</string>");
                }
                Scalar::Bytes(b) => {
                    out.push_str("<base16>");
                    out.push_str(&hex_encode(b));
                    out.push_str("</base16>");
                }
            },
            Category::Array => {
                out.push_str("<array><data>");
                for element in value.iter_elements() {
                    Self::write_value(element, out);
                }
                out.push_str("</data></array>");
            }
            Category::Object => {
                match value.type_name() {
                    Some(name) => {
                        out.push_str("<struct type=\"");
                        escape_into(name, out);
                        out.push_str("\">");
                    }
                    None => out.push_str("<struct>"),
                }
                for member in value.members() {
                    out.push_str("<member><name>");
                    escape_into(member.name.as_deref().unwrap_or(""), out);
                    out.push_str("</name>");
                    Self::write_value(&member.value, out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
        }
        out.push_str("</value>");
    }

    pub(crate) fn read_value(node: roxmltree::Node) -> Result<SerializationInfo> {
        let value_node = if node.tag_name().name() == "value" {
            node
        } else {
            node.children()
                .find(|n| n.is_element() && n.tag_name().name() == "value")
                .ok_or_else(|| Error::Serialization("expected <value> element".into()))?
        };
        let inner = value_node
            .children()
            .find(|n| n.is_element())
            .ok_or_else(|| Error::Serialization("empty <value> element".into()))?;

        match inner.tag_name().name() {
            "nil" => Ok(SerializationInfo::void()),
            "boolean" => {
                let text = inner.text().unwrap_or("0").trim();
                Ok(SerializationInfo::from_scalar(Scalar::Bool(text == "1")))
            }
            "i4" | "i8" | "int" => {
                let text = inner.text().unwrap_or("0").trim();
                let v: i64 = text
                    .parse()
                    .map_err(|_| Error::Serialization(format!("bad integer {text:?}")))?;
                Ok(SerializationInfo::from_scalar(Scalar::Int(v)))
            }
            "double" => {
                let text = inner.text().unwrap_or("0").trim();
                let v: f64 = text
                    .parse()
                    .map_err(|_| Error::Serialization(format!("bad double {text:?}")))?;
                Ok(SerializationInfo::from_scalar(Scalar::Float(v)))
            }
            "string" => Ok(SerializationInfo::from_scalar(Scalar::Str(
                inner.text().unwrap_or("").to_string(),
            ))),
            "base16" => {
                let text = inner.text().unwrap_or("");
                Ok(SerializationInfo::from_scalar(Scalar::Bytes(hex_decode(
                    text,
                )?)))
            }
            "array" => {
                let data = inner
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "data")
                    .ok_or_else(|| Error::Serialization("array missing <data>".into()))?;
                let mut array = SerializationInfo::new_array();
                for value_node in data.children().filter(|n| n.is_element()) {
                    *array.add_element() = Self::read_value(value_node)?;
                }
                Ok(array)
            }
            "struct" => {
                let mut object = SerializationInfo::new_object();
                if let Some(type_name) = inner.attribute("type") {
                    object.set_type_name(type_name);
                }
                for member_node in inner
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "member")
                {
                    let name = member_node
                        .children()
                        .find(|n| n.is_element() && n.tag_name().name() == "name")
                        .and_then(|n| n.text())
                        .unwrap_or("")
                        .to_string();
                    let value_node = member_node
                        .children()
                        .find(|n| n.is_element() && n.tag_name().name() == "value")
                        .ok_or_else(|| Error::Serialization("member missing <value>".into()))?;
                    *object.add_member(name) = Self::read_value(value_node)?;
                }
                Ok(object)
            }
            other => Err(Error::Serialization(format!("unknown XML-RPC tag <{other}>"))),
        }
    }
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn hex_decode(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(Error::Serialization("odd-length hex string".into()));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| Error::Serialization(format!("bad hex byte {:?}", &text[i..i + 2])))
        })
        .collect()
}

impl Formatter for XmlCodec {
    fn encode(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()> {
        let mut text = String::new();
        Self::write_value(value, &mut text);
        out.extend_from_slice(text.as_bytes());
        Ok(())
    }
}

impl Parser for XmlCodec {
    fn decode(&self, input: &[u8]) -> Result<(SerializationInfo, usize)> {
        let text = std::str::from_utf8(input)
            .map_err(|e| Error::Serialization(format!("invalid utf-8: {e}")))?;
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| Error::Serialization(format!("xml parse error: {e}")))?;
        let value = Self::read_value(doc.root_element())?;
        Ok((value, input.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &SerializationInfo) -> SerializationInfo {
        let codec = XmlCodec::new();
        let mut bytes = Vec::new();
        codec.encode(value, &mut bytes).unwrap();
        let (decoded, _) = codec.decode(&bytes).unwrap();
        decoded
    }

    #[test]
    fn struct_round_trips() {
        let mut color = SerializationInfo::new_object();
        color.set_type_name("Color");
        *color.add_member("r") = 6i32.into();
        *color.add_member("g") = 12i32.into();
        *color.add_member("b") = 20i32.into();

        let decoded = round_trip(&color);
        assert_eq!(decoded.type_name(), Some("Color"));
        assert_eq!(decoded.get_member("r").unwrap().to_i64().unwrap(), 6);
        assert_eq!(decoded.get_member("g").unwrap().to_i64().unwrap(), 12);
        assert_eq!(decoded.get_member("b").unwrap().to_i64().unwrap(), 20);
    }

    #[test]
    fn unicode_string_is_preserved() {
        let s = "\u{feff}'\"&<> foo?";
        let value: SerializationInfo = s.into();
        let decoded = round_trip(&value);
        assert_eq!(decoded.to_string_value().unwrap(), s);
    }

    #[test]
    fn array_of_ints_round_trips() {
        let value: SerializationInfo = vec![1i32, 2, 3].into();
        let decoded = round_trip(&value);
        let back: Vec<i32> = (&decoded).try_into().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
