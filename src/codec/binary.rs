// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The binary codec (§4.G, normative): a compact, dictionary-compressed,
//! self-describing encoding for [`SerializationInfo`] trees.
//!
//! This is this implementation's own wire format — per §9's Open Question
//! resolution, no interoperability with any other binary-RPC
//! implementation is claimed. Grounded on the teacher's `core::ser` CDR
//! writer/reader pair for the general shape (a cursor over `Vec<u8>` on
//! the write side, a position-tracking slice reader on the read side) and
//! on the original's dictionary trick for name compression, simplified
//! here to a single 8-byte-wide integer and float representation rather
//! than the source's full short/medium/long/BCD float zoo — this
//! implementation defines its own wire shape, so fidelity to that exact
//! bit layout buys nothing, and a single unambiguous width is far less
//! likely to round-trip incorrectly.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::{Category, Scalar, SerializationInfo};

use super::{Formatter, Parser};

const TAG_VOID: u8 = 0x00;
const TAG_BOOL_FALSE: u8 = 0x10;
const TAG_BOOL_TRUE: u8 = 0x11;
const TAG_INT: u8 = 0x20;
const TAG_UINT: u8 = 0x21;
const TAG_FLOAT: u8 = 0x30;
const TAG_STRING: u8 = 0x40;
const TAG_WSTRING: u8 = 0x41;
const TAG_BYTES: u8 = 0x50;
const TAG_ARRAY: u8 = 0xBD;
const TAG_OBJECT: u8 = 0xBE;
const TERMINATOR: u8 = 0xFF;

const NAME_LITERAL: u8 = 0x00;
const NAME_DICT_REF: u8 = 0x01;
const TYPE_NAME_ABSENT: u8 = 0x02;

/// A dictionary-compressed, self-describing binary codec. The dictionary
/// is per-instance (i.e. per-connection, per §5's resource policy) and
/// grows for the life of the codec unless explicitly reset.
#[derive(Default)]
pub struct BinaryCodec {
    write_dict: RefCell<HashMap<String, u16>>,
    read_dict: RefCell<Vec<String>>,
}

impl BinaryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop both dictionaries, as happens at a protocol-level boundary
    /// (e.g. a fresh connection handshake).
    pub fn reset_dictionary(&self) {
        self.write_dict.borrow_mut().clear();
        self.read_dict.borrow_mut().clear();
    }

    fn write_name(&self, name: &str, out: &mut Vec<u8>) {
        let mut dict = self.write_dict.borrow_mut();
        if let Some(&idx) = dict.get(name) {
            out.push(NAME_DICT_REF);
            out.extend_from_slice(&idx.to_be_bytes());
        } else {
            out.push(NAME_LITERAL);
            out.extend_from_slice(name.as_bytes());
            out.push(0x00);
            let next = dict.len() as u16;
            dict.insert(name.to_string(), next);
        }
    }

    fn write_optional_type_name(&self, type_name: Option<&str>, out: &mut Vec<u8>) {
        match type_name {
            Some(name) => self.write_name(name, out),
            None => out.push(TYPE_NAME_ABSENT),
        }
    }

    fn read_name(&self, input: &[u8], at: &mut usize) -> Result<String> {
        let marker = read_u8(input, at)?;
        match marker {
            NAME_LITERAL => {
                let start = *at;
                while *at < input.len() && input[*at] != 0x00 {
                    *at += 1;
                }
                if *at >= input.len() {
                    return Err(Error::Serialization("unterminated literal name".into()));
                }
                let name = String::from_utf8(input[start..*at].to_vec())
                    .map_err(|e| Error::Serialization(format!("invalid utf-8 in name: {e}")))?;
                *at += 1; // skip the terminating 0x00
                self.read_dict.borrow_mut().push(name.clone());
                Ok(name)
            }
            NAME_DICT_REF => {
                let idx = read_u16(input, at)?;
                self.read_dict
                    .borrow()
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| Error::Serialization(format!("bad dictionary index {idx}")))
            }
            other => Err(Error::Serialization(format!(
                "unexpected name marker 0x{other:02x}"
            ))),
        }
    }

    fn read_optional_type_name(&self, input: &[u8], at: &mut usize) -> Result<Option<String>> {
        if input.get(*at) == Some(&TYPE_NAME_ABSENT) {
            *at += 1;
            return Ok(None);
        }
        Ok(Some(self.read_name(input, at)?))
    }

    fn encode_value(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()> {
        match value.category() {
            Category::Void => out.push(TAG_VOID),
            Category::Value => match value.scalar() {
                Scalar::Null => out.push(TAG_VOID),
                Scalar::Bool(b) => out.push(if *b { TAG_BOOL_TRUE } else { TAG_BOOL_FALSE }),
                Scalar::Int(v) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Scalar::UInt(v) => {
                    out.push(TAG_UINT);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Scalar::Float(v) => {
                    out.push(TAG_FLOAT);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Scalar::Str(s) => {
                    out.push(TAG_STRING);
                    write_length_prefixed(s.as_bytes(), out);
                }
                Scalar::WStr(s) => {
                    out.push(TAG_WSTRING);
                    write_length_prefixed(s.as_bytes(), out);
                }
                Scalar::Bytes(b) => {
                    out.push(TAG_BYTES);
                    write_length_prefixed(b, out);
                }
            },
            Category::Array => {
                out.push(TAG_ARRAY);
                self.write_optional_type_name(value.type_name(), out);
                for element in value.iter_elements() {
                    self.encode_value(element, out)?;
                }
                out.push(TERMINATOR);
            }
            Category::Object => {
                out.push(TAG_OBJECT);
                self.write_optional_type_name(value.type_name(), out);
                for member in value.members() {
                    let name = member
                        .name
                        .as_deref()
                        .ok_or_else(|| Error::Serialization("object member with no name".into()))?;
                    self.write_name(name, out);
                    self.encode_value(&member.value, out)?;
                }
                out.push(TERMINATOR);
            }
        }
        Ok(())
    }

    fn decode_value(&self, input: &[u8], at: &mut usize) -> Result<SerializationInfo> {
        let tag = read_u8(input, at)?;
        match tag {
            TAG_VOID => Ok(SerializationInfo::void()),
            TAG_BOOL_FALSE => Ok(SerializationInfo::from_scalar(Scalar::Bool(false))),
            TAG_BOOL_TRUE => Ok(SerializationInfo::from_scalar(Scalar::Bool(true))),
            TAG_INT => Ok(SerializationInfo::from_scalar(Scalar::Int(read_i64(
                input, at,
            )?))),
            TAG_UINT => Ok(SerializationInfo::from_scalar(Scalar::UInt(read_u64(
                input, at,
            )?))),
            TAG_FLOAT => Ok(SerializationInfo::from_scalar(Scalar::Float(read_f64(
                input, at,
            )?))),
            TAG_STRING => {
                let bytes = read_length_prefixed(input, at)?;
                let s = String::from_utf8(bytes)
                    .map_err(|e| Error::Serialization(format!("invalid utf-8: {e}")))?;
                Ok(SerializationInfo::from_scalar(Scalar::Str(s)))
            }
            TAG_WSTRING => {
                let bytes = read_length_prefixed(input, at)?;
                let s = String::from_utf8(bytes)
                    .map_err(|e| Error::Serialization(format!("invalid utf-8: {e}")))?;
                Ok(SerializationInfo::from_scalar(Scalar::WStr(s)))
            }
            TAG_BYTES => {
                let bytes = read_length_prefixed(input, at)?;
                Ok(SerializationInfo::from_scalar(Scalar::Bytes(bytes)))
            }
            TAG_ARRAY => {
                let type_name = self.read_optional_type_name(input, at)?;
                let mut array = SerializationInfo::new_array();
                if let Some(name) = type_name {
                    array.set_type_name(name);
                }
                loop {
                    if input.get(*at) == Some(&TERMINATOR) {
                        *at += 1;
                        break;
                    }
                    let element = self.decode_value(input, at)?;
                    *array.add_element() = element;
                }
                Ok(array)
            }
            TAG_OBJECT => {
                let type_name = self.read_optional_type_name(input, at)?;
                let mut object = SerializationInfo::new_object();
                if let Some(name) = type_name {
                    object.set_type_name(name);
                }
                loop {
                    if input.get(*at) == Some(&TERMINATOR) {
                        *at += 1;
                        break;
                    }
                    let name = self.read_name(input, at)?;
                    let value = self.decode_value(input, at)?;
                    *object.add_member(name) = value;
                }
                Ok(object)
            }
            other => Err(Error::Serialization(format!(
                "unknown binary tag 0x{other:02x}"
            ))),
        }
    }
}

fn write_length_prefixed(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_length_prefixed(input: &[u8], at: &mut usize) -> Result<Vec<u8>> {
    let len = read_u32(input, at)? as usize;
    if *at + len > input.len() {
        return Err(Error::Serialization("truncated length-prefixed value".into()));
    }
    let bytes = input[*at..*at + len].to_vec();
    *at += len;
    Ok(bytes)
}

fn read_u8(input: &[u8], at: &mut usize) -> Result<u8> {
    let b = *input
        .get(*at)
        .ok_or_else(|| Error::Serialization("truncated input".into()))?;
    *at += 1;
    Ok(b)
}

fn read_u16(input: &[u8], at: &mut usize) -> Result<u16> {
    let bytes = take::<2>(input, at)?;
    Ok(u16::from_be_bytes(bytes))
}

fn read_u32(input: &[u8], at: &mut usize) -> Result<u32> {
    let bytes = take::<4>(input, at)?;
    Ok(u32::from_be_bytes(bytes))
}

fn read_i64(input: &[u8], at: &mut usize) -> Result<i64> {
    let bytes = take::<8>(input, at)?;
    Ok(i64::from_be_bytes(bytes))
}

fn read_u64(input: &[u8], at: &mut usize) -> Result<u64> {
    let bytes = take::<8>(input, at)?;
    Ok(u64::from_be_bytes(bytes))
}

fn read_f64(input: &[u8], at: &mut usize) -> Result<f64> {
    let bytes = take::<8>(input, at)?;
    Ok(f64::from_be_bytes(bytes))
}

fn take<const N: usize>(input: &[u8], at: &mut usize) -> Result<[u8; N]> {
    if *at + N > input.len() {
        return Err(Error::Serialization("truncated input".into()));
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&input[*at..*at + N]);
    *at += N;
    Ok(buf)
}

impl Formatter for BinaryCodec {
    fn encode(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()> {
        self.encode_value(value, out)
    }
}

impl Parser for BinaryCodec {
    /// Decode exactly one value from the front of `input`.
    ///
    /// `read_name` appends to `read_dict` as a side effect of decoding, so a
    /// truncated `input` (the frame hasn't fully arrived yet on a streaming
    /// transport) must not leave partially-applied dictionary entries behind
    /// — the caller is expected to retry this same decode, from offset 0,
    /// once more bytes have arrived, and a half-applied dictionary would
    /// make the retry's name indices diverge from the writer's. Snapshot the
    /// dictionary length up front and roll back to it on any decode error.
    fn decode(&self, input: &[u8]) -> Result<(SerializationInfo, usize)> {
        let dict_len = self.read_dict.borrow().len();
        let mut at = 0;
        match self.decode_value(input, &mut at) {
            Ok(value) => Ok((value, at)),
            Err(e) => {
                self.read_dict.borrow_mut().truncate(dict_len);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &SerializationInfo) -> SerializationInfo {
        let codec = BinaryCodec::new();
        let mut bytes = Vec::new();
        codec.encode(value, &mut bytes).unwrap();
        let (decoded, consumed) = codec.decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn scalar_round_trips() {
        let value: SerializationInfo = 42i64.into();
        assert_eq!(round_trip(&value), value);
        let value: SerializationInfo = "hello".into();
        assert_eq!(round_trip(&value), value);
        let value: SerializationInfo = 3.5f64.into();
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn struct_round_trips_through_a_named_object() {
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
    fn repeated_member_names_are_dictionary_compressed() {
        let codec = BinaryCodec::new();
        let mut array = SerializationInfo::new_array();
        for i in 0..3 {
            let entry = array.add_element();
            *entry = SerializationInfo::new_object();
            *entry.add_member("x") = i.into();
        }
        let mut bytes = Vec::new();
        codec.encode(&array, &mut bytes).unwrap();
        let (decoded, _) = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.get_element(2).unwrap().get_member("x").unwrap().to_i64().unwrap(), 2);
    }

    #[test]
    fn unicode_string_is_preserved_byte_for_byte() {
        let s = "\u{feff}'\"&<> foo?";
        let value: SerializationInfo = s.into();
        let decoded = round_trip(&value);
        assert_eq!(decoded.to_string_value().unwrap(), s);
    }
}
