// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Codecs: mirror-image Formatter/Parser pairs that walk a
//! [`crate::value::SerializationInfo`] tree to and from bytes (§4.G).
//!
//! Grounded on the teacher's `dynamic::value` visitor-style encode/decode
//! split and `core::ser::{Cdr2Encode, Cdr2Decode}` traits — same idea of a
//! small encode/decode trait pair implemented once per wire format, rather
//! than one God-object per format.

pub mod binary;
pub mod json;
pub mod properties;
pub mod xml;

use crate::error::Result;
use crate::value::SerializationInfo;

/// Serialize a [`SerializationInfo`] tree to bytes. Each wire format
/// implements this once; `encode` never partially writes to `out` on
/// error — callers may assume `out`'s length is unchanged.
pub trait Formatter {
    fn encode(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()>;
}

/// Parse a [`SerializationInfo`] tree from bytes. `decode` must consume
/// exactly one top-level value and report how many bytes it read so
/// callers can frame multiple values back-to-back in the same buffer.
pub trait Parser {
    /// Returns the decoded value and the number of bytes consumed from the
    /// front of `input`.
    fn decode(&self, input: &[u8]) -> Result<(SerializationInfo, usize)>;
}
