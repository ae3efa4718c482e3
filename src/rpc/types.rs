// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary-RPC wire framing (§6): a 4-byte sync pattern, a message-kind
//! byte, a single binary-codec value, and a trailing terminator.
//!
//! The sync pattern and kind bytes are this implementation's own choice
//! (§9's Open Question resolution) — no interoperability with any other
//! binary-RPC implementation is claimed.

use crate::codec::binary::BinaryCodec;
use crate::codec::{Formatter, Parser};
use crate::error::{Error, Result};
use crate::value::SerializationInfo;

pub const SYNC_PATTERN: [u8; 4] = [0xC0, 0xDE, 0x00, 0x00];
const FRAME_TERMINATOR: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call = 0x40,
    Response = 0x41,
    Fault = 0x42,
    DomainPrefix = 0x43,
}

impl MessageKind {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x40 => Ok(Self::Call),
            0x41 => Ok(Self::Response),
            0x42 => Ok(Self::Fault),
            0x43 => Ok(Self::DomainPrefix),
            other => Err(Error::Serialization(format!(
                "unknown RPC message kind 0x{other:02x}"
            ))),
        }
    }
}

pub struct Frame {
    pub kind: MessageKind,
    pub body: SerializationInfo,
}

/// Encode one frame using `codec`'s current dictionary state (the
/// dictionary is intentionally shared across every frame on a connection,
/// per §5's resource policy).
pub fn encode_frame(kind: MessageKind, body: &SerializationInfo, codec: &BinaryCodec, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&SYNC_PATTERN);
    out.push(kind as u8);
    codec.encode(body, out)?;
    out.push(FRAME_TERMINATOR);
    Ok(())
}

/// Attempt to decode exactly one frame from the front of `buf`. Returns
/// `Ok(None)` if `buf` does not yet hold a complete frame (the caller
/// should read more bytes and retry) rather than erroring, since frames
/// arrive incrementally off a stream transport.
pub fn try_decode_frame(buf: &[u8], codec: &BinaryCodec) -> Result<Option<(Frame, usize)>> {
    if buf.len() < SYNC_PATTERN.len() + 1 {
        return Ok(None);
    }
    if buf[..SYNC_PATTERN.len()] != SYNC_PATTERN {
        return Err(Error::Serialization("bad RPC frame sync pattern".into()));
    }
    let kind = MessageKind::from_byte(buf[SYNC_PATTERN.len()])?;
    let body_start = SYNC_PATTERN.len() + 1;

    let (body, consumed) = match codec.decode(&buf[body_start..]) {
        Ok(result) => result,
        Err(_) => return Ok(None), // incomplete value; wait for more bytes
    };
    let terminator_at = body_start + consumed;
    if terminator_at >= buf.len() {
        return Ok(None);
    }
    if buf[terminator_at] != FRAME_TERMINATOR {
        return Err(Error::Serialization("missing RPC frame terminator".into()));
    }
    Ok(Some((Frame { kind, body }, terminator_at + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips() {
        let codec = BinaryCodec::new();
        let mut call = SerializationInfo::new_array();
        *call.add_element() = "multiply".into();

        let mut bytes = Vec::new();
        encode_frame(MessageKind::Call, &call, &codec, &mut bytes).unwrap();

        let (frame, consumed) = try_decode_frame(&bytes, &codec).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(frame.kind, MessageKind::Call);
        assert_eq!(
            frame.body.get_element(0).unwrap().to_string_value().unwrap(),
            "multiply"
        );
    }

    #[test]
    fn truncated_input_reports_incomplete_rather_than_error() {
        let codec = BinaryCodec::new();
        let mut call = SerializationInfo::new_array();
        *call.add_element() = "multiply".into();
        let mut bytes = Vec::new();
        encode_frame(MessageKind::Call, &call, &codec, &mut bytes).unwrap();

        let truncated = &bytes[..bytes.len() - 2];
        assert!(try_decode_frame(truncated, &codec).unwrap().is_none());
    }

    /// A frame split across two TCP segments must not corrupt the
    /// connection's shared name dictionary: the incomplete first attempt
    /// is re-parsed from offset 0 once the rest of the frame arrives, and
    /// a later frame's dictionary references must still resolve against
    /// names as they were assigned on that single successful parse.
    #[test]
    fn split_frame_does_not_corrupt_the_shared_dictionary() {
        let codec = BinaryCodec::new();

        let mut color_a = SerializationInfo::new_object();
        color_a.set_type_name("Color");
        *color_a.add_member("r") = 2i32.into();
        *color_a.add_member("g") = 3i32.into();
        *color_a.add_member("b") = 4i32.into();
        let mut call = SerializationInfo::new_array();
        *call.add_element() = "multiply".into();
        *call.add_element() = color_a;

        let mut bytes = Vec::new();
        encode_frame(MessageKind::Call, &call, &codec, &mut bytes).unwrap();

        // Simulate the frame arriving in two segments: the first cuts off
        // partway through the member names, forcing `try_decode_frame` to
        // report "incomplete" after `read_name` has already pushed "r" (and
        // maybe "g") into the read dictionary.
        let split_at = bytes.len() / 2;
        let first_segment = &bytes[..split_at];
        assert!(try_decode_frame(first_segment, &codec).unwrap().is_none());

        // The full frame now re-parses from offset 0. If the dictionary
        // wasn't rolled back, "r"/"g"/"b" would be appended a second time
        // at the wrong indices.
        let (frame, consumed) = try_decode_frame(&bytes, &codec).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        let decoded_color = frame.body.get_element(1).unwrap();
        assert_eq!(decoded_color.get_member("r").unwrap().to_i64().unwrap(), 2);
        assert_eq!(decoded_color.get_member("g").unwrap().to_i64().unwrap(), 3);
        assert_eq!(decoded_color.get_member("b").unwrap().to_i64().unwrap(), 4);

        // A second frame that relies on dictionary back-references for the
        // same member names must still resolve them correctly.
        let mut color_b = SerializationInfo::new_object();
        color_b.set_type_name("Color");
        *color_b.add_member("r") = 3i32.into();
        *color_b.add_member("g") = 4i32.into();
        *color_b.add_member("b") = 5i32.into();
        let mut call_b = SerializationInfo::new_array();
        *call_b.add_element() = "multiply".into();
        *call_b.add_element() = color_b;

        let mut bytes_b = Vec::new();
        encode_frame(MessageKind::Call, &call_b, &codec, &mut bytes_b).unwrap();
        let (frame_b, _) = try_decode_frame(&bytes_b, &codec).unwrap().unwrap();
        let decoded_color_b = frame_b.body.get_element(1).unwrap();
        assert_eq!(decoded_color_b.get_member("r").unwrap().to_i64().unwrap(), 3);
        assert_eq!(decoded_color_b.get_member("g").unwrap().to_i64().unwrap(), 4);
        assert_eq!(decoded_color_b.get_member("b").unwrap().to_i64().unwrap(), 5);
    }
}
