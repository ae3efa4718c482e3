// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The properties/INI codec (§4.G, §6): a line-oriented format coercing
//! dotted keys into nested objects.
//!
//! Grounded on the original's `PropertiesParser`: `:` or `=` as the
//! key/value separator, `#` or `!` line comments, trailing-backslash line
//! continuation, and `\uXXXX` Unicode escapes. This implementation adds
//! the dotted-key → nested-object coercion called for by §6 and §8's
//! scenario 6.

use crate::error::{Error, Result};
use crate::value::{Category, Scalar, SerializationInfo};

use super::{Formatter, Parser};

pub struct PropertiesCodec;

impl PropertiesCodec {
    pub fn new() -> Self {
        Self
    }

    fn join_continuations(text: &str) -> Vec<String> {
        let mut logical_lines = Vec::new();
        let mut pending = String::new();
        for raw_line in text.lines() {
            let trailing_backslashes = raw_line.chars().rev().take_while(|&c| c == '\\').count();
            if trailing_backslashes % 2 == 1 {
                pending.push_str(&raw_line[..raw_line.len() - 1]);
            } else {
                pending.push_str(raw_line);
                logical_lines.push(std::mem::take(&mut pending));
            }
        }
        if !pending.is_empty() {
            logical_lines.push(pending);
        }
        logical_lines
    }

    fn split_key_value(line: &str) -> Option<(String, String)> {
        let bytes = line.as_bytes();
        let mut escaped = false;
        for (i, &b) in bytes.iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' => escaped = true,
                b'=' | b':' => {
                    let key = line[..i].trim().to_string();
                    let value = line[i + 1..].trim_start().to_string();
                    return Some((key, value));
                }
                _ => {}
            }
        }
        None
    }

    fn unescape(s: &str) -> Result<String> {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(':') => out.push(':'),
                Some('=') => out.push('='),
                Some('#') => out.push('#'),
                Some('!') => out.push('!'),
                Some(' ') => out.push(' '),
                Some('u') => {
                    let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                    if hex.len() != 4 {
                        return Err(Error::Serialization("truncated \\u escape".into()));
                    }
                    let code = u32::from_str_radix(&hex, 16)
                        .map_err(|_| Error::Serialization(format!("bad \\u escape {hex:?}")))?;
                    let ch = char::from_u32(code)
                        .ok_or_else(|| Error::Serialization(format!("invalid codepoint {code:x}")))?;
                    out.push(ch);
                }
                Some(other) => out.push(other),
                None => return Err(Error::Serialization("trailing backslash".into())),
            }
        }
        Ok(out)
    }

    fn escape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '=' => out.push_str("\\="),
                ':' => out.push_str("\\:"),
                '#' => out.push_str("\\#"),
                '!' => out.push_str("\\!"),
                c if (c as u32) > 0x7e => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => out.push(c),
            }
        }
        out
    }

    fn flatten(prefix: &str, node: &SerializationInfo, lines: &mut Vec<String>) {
        match node.category() {
            Category::Object => {
                for member in node.members() {
                    let name = member.name.as_deref().unwrap_or("");
                    let path = if prefix.is_empty() {
                        name.to_string()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    Self::flatten(&path, &member.value, lines);
                }
            }
            Category::Array => {
                for (i, element) in node.iter_elements().enumerate() {
                    let path = format!("{prefix}.{i}");
                    Self::flatten(&path, element, lines);
                }
            }
            Category::Value | Category::Void => {
                let value_text = match node.scalar() {
                    Scalar::Null => String::new(),
                    Scalar::Bool(b) => b.to_string(),
                    Scalar::Int(v) => v.to_string(),
                    Scalar::UInt(v) => v.to_string(),
                    Scalar::Float(v) => v.to_string(),
                    Scalar::Str(s) | Scalar::WStr(s) => Self::escape(s),
                    Scalar::Bytes(_) => String::new(),
                };
                lines.push(format!("{prefix}={value_text}"));
            }
        }
    }
}

impl Default for PropertiesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for PropertiesCodec {
    fn encode(&self, value: &SerializationInfo, out: &mut Vec<u8>) -> Result<()> {
        let mut lines = Vec::new();
        Self::flatten("", value, &mut lines);
        for line in lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        Ok(())
    }
}

impl Parser for PropertiesCodec {
    fn decode(&self, input: &[u8]) -> Result<(SerializationInfo, usize)> {
        let text = std::str::from_utf8(input)
            .map_err(|e| Error::Serialization(format!("invalid utf-8: {e}")))?;
        let mut root = SerializationInfo::new_object();
        for logical_line in Self::join_continuations(text) {
            let trimmed = logical_line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let Some((key, raw_value)) = Self::split_key_value(trimmed) else {
                continue;
            };
            let key = Self::unescape(&key)?;
            let value = Self::unescape(&raw_value)?;

            let mut node = &mut root;
            let parts: Vec<&str> = key.split('.').collect();
            for part in &parts[..parts.len() - 1] {
                node = node.ensure_member(part);
            }
            *node.ensure_member(parts[parts.len() - 1]) =
                SerializationInfo::from_scalar(Scalar::Str(value));
        }
        Ok((root, input.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_keys_coerce_into_shared_nested_objects() {
        let codec = PropertiesCodec::new();
        let input = b"a.b.c.d=5\na.e.f.g=7\n";
        let (si, _) = codec.decode(input).unwrap();

        assert_eq!(si.get_member("a.b.c.d").unwrap().to_i64().unwrap(), 5);
        assert_eq!(
            si.get_member("a")
                .unwrap()
                .get_member("b")
                .unwrap()
                .get_member("c.d")
                .unwrap()
                .to_i64()
                .unwrap(),
            5
        );
        assert_eq!(si.get_member("a.e.f.g").unwrap().to_i64().unwrap(), 7);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let codec = PropertiesCodec::new();
        let input = b"# a comment\n! also a comment\n\nkey=value\n";
        let (si, _) = codec.decode(input).unwrap();
        assert_eq!(si.get_member("key").unwrap().to_string_value().unwrap(), "value");
    }

    #[test]
    fn line_continuation_joins_the_next_line() {
        let codec = PropertiesCodec::new();
        let input = b"key=hello \\\nworld\n";
        let (si, _) = codec.decode(input).unwrap();
        assert_eq!(
            si.get_member("key").unwrap().to_string_value().unwrap(),
            "hello world"
        );
    }

    #[test]
    fn unicode_escape_decodes_to_the_right_codepoint() {
        let codec = PropertiesCodec::new();
        let input = "key=\\u00e9\n".as_bytes();
        let (si, _) = codec.decode(input).unwrap();
        assert_eq!(si.get_member("key").unwrap().to_string_value().unwrap(), "\u{e9}");
    }
}
