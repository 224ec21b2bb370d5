//! Opaque wrapper for passwords and raw tokens.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// A string that must not appear in logs.
///
/// `Debug` and `Display` render a fixed placeholder. The value is reachable
/// only through [`SecretString::expose_secret`], which keeps every read
/// greppable.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a value.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// `true` when the wrapped value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretString::from("GoodPass123!");
        assert_eq!(format!("{secret:?}"), "SecretString(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose_secret(), "GoodPass123!");
    }
}
