// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `RemoteException`: an error a server returns to a client across the
//! wire (§4.H, §6). Grounded on the original's `RemoteException`: a plain
//! text message plus an integer return code, both attacker-controlled only
//! in the sense that a misbehaving service picks them — never a source
//! chain, since nothing on this side of the wire produced the failure.

use std::fmt;

/// A fault reported by the remote end of an RPC call.
///
/// Unlike [`crate::error::Error`], this type never wraps a `source()` —
/// whatever caused the failure happened in a different process (or at
/// least a different serialization domain) and its backtrace is gone by
/// the time this value exists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteException {
    text: String,
    rc: i32,
}

impl RemoteException {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rc: 0,
        }
    }

    pub fn with_code(text: impl Into<String>, rc: i32) -> Self {
        Self {
            text: text.into(),
            rc,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rc(&self) -> i32 {
        self.rc
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.rc = 0;
    }
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rc != 0 {
            write!(f, "{} (rc={})", self.text, self.rc)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

impl std::error::Error for RemoteException {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_and_without_a_code() {
        let plain = RemoteException::new("boom");
        assert_eq!(plain.to_string(), "boom");

        let coded = RemoteException::with_code("no such method", 404);
        assert_eq!(coded.to_string(), "no such method (rc=404)");
    }

    #[test]
    fn clear_resets_both_fields() {
        let mut e = RemoteException::with_code("boom", 7);
        e.clear();
        assert_eq!(e.text(), "");
        assert_eq!(e.rc(), 0);
    }
}
