// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The JSON codec (§4.G, non-normative): a lossless mapping between
//! [`SerializationInfo`] and `serde_json::Value`.
//!
//! Built directly on `serde_json`, with its `preserve_order` feature
//! enabled so object member order survives a round trip (needed for §8's
//! scenario 2 — the same bytes must produce the same result regardless of
//! which codec carried them). JSON has no native byte-string or type-tag
//! concept; byte strings serialize as an array of `u8` and a node's
//! `type_name`, when present, rides along as a reserved `"$type"` member
//! on an `Object` node (absent from plain `Array`s, which have no member
//! names to attach it to).

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::value::{Category, Scalar, SerializationInfo};

use super::{Formatter, Parser};

const TYPE_NAME_KEY: &str = "$type";

pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn to_json(value: &SerializationInfo) -> Value {
        match value.category() {
            Category::Void => Value::Null,
            Category::Value => match value.scalar() {
                Scalar::Null => Value::Null,
                Scalar::Bool(b) => Value::Bool(*b),
                Scalar::Int(v) => Value::Number(Number::from(*v)),
                Scalar::UInt(v) => Value::Number(Number::from(*v)),
                Scalar::Float(v) => Number::from_f64(*v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Scalar::Str(s) | Scalar::WStr(s) => Value::String(s.clone()),
                Scalar::Bytes(b) => {
                    Value::Array(b.iter().map(|byte| Value::Number((*byte).into())).collect())
                }
            },
            Category::Array => Value::Array(value.iter_elements().map(Self::to_json).collect()),
            Category::Object => {
                let mut map = Map::new();
                if let Some(name) = value.type_name() {
                    map.insert(TYPE_NAME_KEY.to_string(), Value::String(name.to_string()));
                }
                for member in value.members() {
                    let name = member.name.clone().unwrap_or_default();
                    map.insert(name, Self::to_json(&member.value));
                }
                Value::Object(map)
            }
        }
    }

    pub fn from_json(value: &Value) -> SerializationInfo {
        match value {
            Value::Null => SerializationInfo::void(),
            Value::Bool(b) => SerializationInfo::from_scalar(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SerializationInfo::from_scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    SerializationInfo::from_scalar(Scalar::UInt(u))
                } else {
                    SerializationInfo::from_scalar(Scalar::Float(n.as_f64().unwrap_or(0.0)))
                }
            }
            Value::String(s) => SerializationInfo::from_scalar(Scalar::Str(s.clone())),
            Value::Array(items) => {
                let mut array = SerializationInfo::new_array();
                for item in items {
                    *array.add_element() = Self::from_json(item);
                }
                array
            }
            Value::Object(map) => {
                let mut object = SerializationInfo::new_object();
                for (key, value) in map {
                    if key == TYPE_NAME_KEY {
                        if let Value::String(name) = value {
                            object.set_type_name(name.clone());
                        }
                        continue;
                    }
                    *object.add_member(key.clone()) = Self::from_json(value);
                }
                object
            }
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for JsonCodec {
    fn encode(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()> {
        let json = Self::to_json(value);
        serde_json::to_writer(out, &json)
            .map_err(|e| Error::Serialization(format!("json encode failed: {e}")))
    }
}

impl Parser for JsonCodec {
    fn decode(&self, input: &[u8]) -> Result<(SerializationInfo, usize)> {
        let mut stream = serde_json::Deserializer::from_slice(input).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                Ok((Self::from_json(&value), consumed))
            }
            Some(Err(e)) => Err(Error::Serialization(format!("json decode failed: {e}"))),
            None => Err(Error::Serialization("empty json input".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_round_trips_preserving_member_order() {
        let codec = JsonCodec::new();
        let mut color = SerializationInfo::new_object();
        color.set_type_name("Color");
        *color.add_member("r") = 6i32.into();
        *color.add_member("g") = 12i32.into();
        *color.add_member("b") = 20i32.into();

        let mut bytes = Vec::new();
        codec.encode(&color, &mut bytes).unwrap();
        let (decoded, consumed) = codec.decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.type_name(), Some("Color"));
        let names: Vec<_> = decoded.members().iter().filter_map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["r", "g", "b"]);
    }

    #[test]
    fn unicode_string_is_preserved() {
        let codec = JsonCodec::new();
        let s = "\u{feff}'\"&<> foo?";
        let value: SerializationInfo = s.into();
        let mut bytes = Vec::new();
        codec.encode(&value, &mut bytes).unwrap();
        let (decoded, _) = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.to_string_value().unwrap(), s);
    }
}
