// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `SerializationInfo` (§3, §4.F): the dynamically typed value tree every
//! codec and every RPC call travels through.
//!
//! Grounded directly on the teacher's `dynamic::value::DynamicValue` — same
//! tagged-enum-of-scalars-plus-composites shape, same `as_*`/`get_field`
//! accessor style — generalized from DDS's fixed IDL scalar set to the
//! spec's {null, bool, int64, uint64, float, narrow-string, wide-string,
//! byte-string} scalar set, and with the category (Value/Array/Object)
//! tracked independently of content so format round-trips preserve it even
//! for an empty array or object.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// The scalar content of a `Value`-category node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Stand-in for the source's "long double"; binary-codec width (short
    /// 3-byte / medium 5-byte / long 10-byte) is a wire-format concern
    /// handled by `codec::binary`, not by this in-memory representation.
    Float(f64),
    Str(String),
    WStr(String),
    Bytes(Vec<u8>),
}

/// Which of the four shapes (§3) a node currently holds. Tracked
/// independently of `members`/`scalar` so that, e.g., an empty `Array` is
/// distinguishable from `Void` on a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Void,
    Value,
    Array,
    Object,
}

/// One child of an `Array` or `Object` node. `name` is `None` for anonymous
/// array elements and `Some` for object members (possibly duplicated —
/// `add_member` preserves multi-maps, per §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: Option<String>,
    pub value: SerializationInfo,
}

/// The dynamically typed value node described by §3/§4.F.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializationInfo {
    category: Category,
    scalar: Scalar,
    members: Vec<Member>,
    type_name: Option<String>,
}

impl Default for SerializationInfo {
    fn default() -> Self {
        Self::void()
    }
}

impl SerializationInfo {
    pub fn void() -> Self {
        Self {
            category: Category::Void,
            scalar: Scalar::Null,
            members: Vec::new(),
            type_name: None,
        }
    }

    pub fn from_scalar(scalar: Scalar) -> Self {
        Self {
            category: Category::Value,
            scalar,
            members: Vec::new(),
            type_name: None,
        }
    }

    pub fn new_array() -> Self {
        Self {
            category: Category::Array,
            scalar: Scalar::Null,
            members: Vec::new(),
            type_name: None,
        }
    }

    pub fn new_object() -> Self {
        Self {
            category: Category::Object,
            scalar: Scalar::Null,
            members: Vec::new(),
            type_name: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn scalar(&self) -> &Scalar {
        &self.scalar
    }

    pub fn is_void(&self) -> bool {
        self.category == Category::Void
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn set_type_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Append a named member (creating one if `self` was `Void`, which is
    /// silently promoted to `Object`). Appends even if `name` duplicates an
    /// existing member, per §3's multi-map invariant. Returns a mutable
    /// reference to the freshly appended (currently `Void`) child so the
    /// caller can set its value.
    pub fn add_member(&mut self, name: impl Into<String>) -> &mut SerializationInfo {
        if self.category == Category::Void {
            self.category = Category::Object;
        }
        self.members.push(Member {
            name: Some(name.into()),
            value: SerializationInfo::void(),
        });
        &mut self.members.last_mut().unwrap().value
    }

    /// Find an existing member named `name`, or append a new one. Unlike
    /// `add_member`, never creates a duplicate — used to build nested
    /// objects out of dotted paths (§6's properties codec) where two keys
    /// sharing a prefix must share the same intermediate node.
    pub fn ensure_member(&mut self, name: &str) -> &mut SerializationInfo {
        if self.category == Category::Void {
            self.category = Category::Object;
        }
        if let Some(idx) = self.members.iter().position(|m| m.name.as_deref() == Some(name)) {
            return &mut self.members[idx].value;
        }
        self.members.push(Member {
            name: Some(name.to_string()),
            value: SerializationInfo::void(),
        });
        &mut self.members.last_mut().unwrap().value
    }

    /// Append an anonymous array element (`addMember()` with no name).
    pub fn add_element(&mut self) -> &mut SerializationInfo {
        if self.category == Category::Void {
            self.category = Category::Array;
        }
        self.members.push(Member {
            name: None,
            value: SerializationInfo::void(),
        });
        &mut self.members.last_mut().unwrap().value
    }

    fn find_member_direct(&self, name: &str) -> Option<&SerializationInfo> {
        self.members
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .map(|m| &m.value)
    }

    /// Dotted-path lookup: `get_member("a.b.c")` is exactly
    /// `get_member("a")?.get_member("b")?.get_member("c")`. Returns the
    /// first match at each level (never errors on ambiguity from a
    /// duplicated name).
    pub fn get_member(&self, path: &str) -> Result<&SerializationInfo> {
        let mut current = self;
        for part in path.split('.') {
            current = current
                .find_member_direct(part)
                .ok_or_else(|| Error::Conversion(format!("no such member: {part}")))?;
        }
        Ok(current)
    }

    /// The pointer-or-null variant of `get_member`.
    pub fn find_member(&self, path: &str) -> Option<&SerializationInfo> {
        self.get_member(path).ok()
    }

    /// Index into an `Array` node.
    pub fn get_element(&self, index: usize) -> Result<&SerializationInfo> {
        self.members
            .get(index)
            .map(|m| &m.value)
            .ok_or_else(|| Error::Conversion(format!("array index {index} out of range")))
    }

    pub fn iter_elements(&self) -> impl Iterator<Item = &SerializationInfo> {
        self.members.iter().map(|m| &m.value)
    }

    // ---- scalar coercion (§4.F) ----

    pub fn to_bool(&self) -> Result<bool> {
        match &self.scalar {
            Scalar::Bool(v) => Ok(*v),
            Scalar::Int(v) => Ok(*v != 0),
            Scalar::UInt(v) => Ok(*v != 0),
            Scalar::Str(s) | Scalar::WStr(s) => match s.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(conversion_error("bool", s)),
            },
            _ => Err(wrong_category("bool")),
        }
    }

    pub fn to_i64(&self) -> Result<i64> {
        match &self.scalar {
            Scalar::Int(v) => Ok(*v),
            Scalar::UInt(v) => i64::try_from(*v).map_err(|_| overflow("i64")),
            Scalar::Bool(v) => Ok(*v as i64),
            Scalar::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            Scalar::Str(s) | Scalar::WStr(s) => {
                s.trim().parse::<i64>().map_err(|_| conversion_error("i64", s))
            }
            _ => Err(wrong_category("i64")),
        }
    }

    pub fn to_u64(&self) -> Result<u64> {
        match &self.scalar {
            Scalar::UInt(v) => Ok(*v),
            Scalar::Int(v) => u64::try_from(*v).map_err(|_| overflow("u64")),
            Scalar::Bool(v) => Ok(*v as u64),
            Scalar::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Ok(*v as u64),
            Scalar::Str(s) | Scalar::WStr(s) => {
                s.trim().parse::<u64>().map_err(|_| conversion_error("u64", s))
            }
            _ => Err(wrong_category("u64")),
        }
    }

    pub fn to_f64(&self) -> Result<f64> {
        match &self.scalar {
            Scalar::Float(v) => Ok(*v),
            Scalar::Int(v) => Ok(*v as f64),
            Scalar::UInt(v) => Ok(*v as f64),
            Scalar::Str(s) | Scalar::WStr(s) => {
                s.trim().parse::<f64>().map_err(|_| conversion_error("f64", s))
            }
            _ => Err(wrong_category("f64")),
        }
    }

    /// Numeric → string uses the canonical decimal form, no locale.
    pub fn to_string_value(&self) -> Result<String> {
        match &self.scalar {
            Scalar::Str(s) | Scalar::WStr(s) => Ok(s.clone()),
            Scalar::Int(v) => Ok(v.to_string()),
            Scalar::UInt(v) => Ok(v.to_string()),
            Scalar::Float(v) => Ok(format!("{v}")),
            Scalar::Bool(v) => Ok(v.to_string()),
            _ => Err(wrong_category("string")),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.scalar {
            Scalar::Bytes(b) => Ok(b.clone()),
            Scalar::Str(s) | Scalar::WStr(s) => Ok(s.clone().into_bytes()),
            _ => Err(wrong_category("byte-string")),
        }
    }
}

fn wrong_category(target: &str) -> Error {
    Error::Conversion(format!("value is not representable as {target}"))
}

fn conversion_error(target: &str, src: &str) -> Error {
    Error::Conversion(format!("cannot convert {src:?} to {target}"))
}

fn overflow(target: &str) -> Error {
    Error::Conversion(format!("value overflows {target}"))
}

// ---- encoding (the `<<=` direction) ----

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for SerializationInfo {
            fn from(v: $t) -> Self {
                SerializationInfo::from_scalar(Scalar::Int(v as i64))
            }
        })*
    };
}
macro_rules! impl_from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for SerializationInfo {
            fn from(v: $t) -> Self {
                SerializationInfo::from_scalar(Scalar::UInt(v as u64))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64);
impl_from_uint!(u8, u16, u32, u64);

impl From<bool> for SerializationInfo {
    fn from(v: bool) -> Self {
        SerializationInfo::from_scalar(Scalar::Bool(v))
    }
}

impl From<f32> for SerializationInfo {
    fn from(v: f32) -> Self {
        SerializationInfo::from_scalar(Scalar::Float(v as f64))
    }
}

impl From<f64> for SerializationInfo {
    fn from(v: f64) -> Self {
        SerializationInfo::from_scalar(Scalar::Float(v))
    }
}

impl From<String> for SerializationInfo {
    fn from(v: String) -> Self {
        SerializationInfo::from_scalar(Scalar::Str(v))
    }
}

impl From<&str> for SerializationInfo {
    fn from(v: &str) -> Self {
        SerializationInfo::from_scalar(Scalar::Str(v.to_string()))
    }
}

impl From<Vec<u8>> for SerializationInfo {
    fn from(v: Vec<u8>) -> Self {
        SerializationInfo::from_scalar(Scalar::Bytes(v))
    }
}

/// Containers serialize as `Array` with children in iteration order.
impl<T: Into<SerializationInfo>> From<Vec<T>> for SerializationInfo {
    fn from(v: Vec<T>) -> Self {
        let mut si = SerializationInfo::new_array();
        for item in v {
            *si.add_element() = item.into();
        }
        si
    }
}

/// Maps serialize as an `Array` of key-value `Object` pairs (§4.F).
impl<V: Into<SerializationInfo>> From<HashMap<String, V>> for SerializationInfo {
    fn from(map: HashMap<String, V>) -> Self {
        let mut si = SerializationInfo::new_array();
        for (k, v) in map {
            let entry = si.add_element();
            *entry = SerializationInfo::new_object();
            *entry.add_member("key") = k.into();
            *entry.add_member("value") = v.into();
        }
        si
    }
}

impl<V: Into<SerializationInfo>> From<BTreeMap<String, V>> for SerializationInfo {
    fn from(map: BTreeMap<String, V>) -> Self {
        let mut si = SerializationInfo::new_array();
        for (k, v) in map {
            let entry = si.add_element();
            *entry = SerializationInfo::new_object();
            *entry.add_member("key") = k.into();
            *entry.add_member("value") = v.into();
        }
        si
    }
}

// ---- decoding (the `>>=` direction) ----

impl TryFrom<&SerializationInfo> for bool {
    type Error = Error;
    fn try_from(si: &SerializationInfo) -> Result<Self> {
        si.to_bool()
    }
}

macro_rules! impl_try_from_signed {
    ($($t:ty),*) => {
        $(impl TryFrom<&SerializationInfo> for $t {
            type Error = Error;
            fn try_from(si: &SerializationInfo) -> Result<Self> {
                let v = si.to_i64()?;
                <$t>::try_from(v).map_err(|_| overflow(stringify!($t)))
            }
        })*
    };
}
macro_rules! impl_try_from_unsigned {
    ($($t:ty),*) => {
        $(impl TryFrom<&SerializationInfo> for $t {
            type Error = Error;
            fn try_from(si: &SerializationInfo) -> Result<Self> {
                let v = si.to_u64()?;
                <$t>::try_from(v).map_err(|_| overflow(stringify!($t)))
            }
        })*
    };
}

impl_try_from_signed!(i8, i16, i32, i64);
impl_try_from_unsigned!(u8, u16, u32, u64);

impl TryFrom<&SerializationInfo> for f32 {
    type Error = Error;
    fn try_from(si: &SerializationInfo) -> Result<Self> {
        Ok(si.to_f64()? as f32)
    }
}

impl TryFrom<&SerializationInfo> for f64 {
    type Error = Error;
    fn try_from(si: &SerializationInfo) -> Result<Self> {
        si.to_f64()
    }
}

impl TryFrom<&SerializationInfo> for String {
    type Error = Error;
    fn try_from(si: &SerializationInfo) -> Result<Self> {
        si.to_string_value()
    }
}

impl<T> TryFrom<&SerializationInfo> for Vec<T>
where
    T: for<'a> TryFrom<&'a SerializationInfo, Error = Error>,
{
    type Error = Error;
    fn try_from(si: &SerializationInfo) -> Result<Self> {
        if si.category() != Category::Array {
            return Err(wrong_category("array"));
        }
        si.iter_elements().map(T::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let si: SerializationInfo = 42i32.into();
        let back: i32 = (&si).try_into().unwrap();
        assert_eq!(back, 42);
    }

    #[test]
    fn numeric_string_coercion() {
        let si = SerializationInfo::from_scalar(Scalar::Str("123".into()));
        assert_eq!(si.to_i64().unwrap(), 123);
        let si = SerializationInfo::from_scalar(Scalar::Str("not a number".into()));
        assert!(si.to_i64().is_err());
    }

    #[test]
    fn array_round_trip() {
        let si: SerializationInfo = vec![1i32, 2, 3].into();
        assert_eq!(si.category(), Category::Array);
        let back: Vec<i32> = (&si).try_into().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn dotted_path_lookup_matches_nested_get_member() {
        let mut root = SerializationInfo::new_object();
        let mut a = SerializationInfo::new_object();
        let mut b = SerializationInfo::new_object();
        *b.add_member("c") = SerializationInfo::from(5i32);
        *a.add_member("b") = b;
        *root.add_member("a") = a;

        let via_dotted = root.get_member("a.b.c").unwrap();
        let via_chain = root
            .get_member("a")
            .unwrap()
            .get_member("b")
            .unwrap()
            .get_member("c")
            .unwrap();
        assert_eq!(via_dotted, via_chain);
        assert_eq!(via_dotted.to_i64().unwrap(), 5);
    }

    #[test]
    fn add_member_preserves_duplicates() {
        let mut obj = SerializationInfo::new_object();
        *obj.add_member("x") = SerializationInfo::from(1i32);
        *obj.add_member("x") = SerializationInfo::from(2i32);
        assert_eq!(obj.len(), 2);
        // get_member returns the first match.
        assert_eq!(obj.get_member("x").unwrap().to_i64().unwrap(), 1);
    }

    #[test]
    fn anonymous_array_elements() {
        let mut arr = SerializationInfo::new_array();
        *arr.add_element() = SerializationInfo::from(10i32);
        *arr.add_element() = SerializationInfo::from(20i32);
        assert_eq!(arr.get_element(0).unwrap().to_i64().unwrap(), 10);
        assert_eq!(arr.get_element(1).unwrap().to_i64().unwrap(), 20);
        assert!(arr.get_element(2).is_err());
    }
}
