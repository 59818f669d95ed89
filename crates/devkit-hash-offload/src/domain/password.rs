//! # Password
//!
//! Opaque password wrapper. Never printed, cleared from memory on drop.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A plaintext password travelling to a hash worker.
///
/// `Debug` and `Display` are redacted so the value cannot leak into
/// `tracing` fields by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext. Only the hashing primitive should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes. bcrypt only reads the first 72.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::new("hunter2");
        assert_eq!(format!("{:?}", password), "Password(***)");
        assert_eq!(password.to_string(), "***");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let password = Password::new("hunter2");
        let json = serde_json::to_string(&password).unwrap();
        assert_eq!(json, "\"hunter2\"");

        let parsed: Password = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.expose(), "hunter2");
    }
}
