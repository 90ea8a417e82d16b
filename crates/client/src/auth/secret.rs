//! Opaque holder for sensitive string values
//!
//! Wraps tokens and client secrets so they cannot leak through `Debug`,
//! `Display`, or log output. The wrapped memory is zeroed on drop.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A sensitive string (access token, refresh token, or client secret).
///
/// The default textual renderings never contain the wrapped value:
/// `Debug` prints `Secret(***)` and `Display` prints `***`. The value is
/// only reachable through [`Secret::expose`], and the underlying memory is
/// zeroed when the value is dropped.
///
/// Deserialization is transparent so credential files can map plain TOML
/// strings directly onto `Secret` fields. There is intentionally no
/// `Serialize` implementation; a secret cannot round-trip through a
/// serializer by accident.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret {
    inner: String,
}

impl Secret {
    /// Wrap a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { inner: value.into() }
    }

    /// Expose the wrapped value.
    ///
    /// # Security Warning
    /// The exposed value should not be stored or logged. Use only for
    /// immediate operations that require the string value, such as writing
    /// a request body or an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Check whether the wrapped value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Length of the wrapped value in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

// Equality compares wrapped content. Not constant-time; these values are
// compared against each other in tests and cache bookkeeping, never against
// attacker-controlled input.
impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Secret {}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl FromStr for Secret {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::secret.
    use super::*;

    /// Validates `Secret::new` behavior for the creation and exposure
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `secret.expose()` equals `"hunter2"`.
    /// - Confirms `secret.len()` equals `7`.
    #[test]
    fn test_secret_creation() {
        let secret = Secret::new("hunter2");
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(secret.len(), 7);
    }

    /// Validates `Secret` debug rendering for the redaction scenario.
    ///
    /// Assertions:
    /// - Confirms `debug_str` equals `"Secret(***)"`.
    /// - Ensures `!debug_str.contains("hunter2")` evaluates to true.
    #[test]
    fn test_secret_debug_redacts() {
        let secret = Secret::new("hunter2");
        let debug_str = format!("{secret:?}");
        assert_eq!(debug_str, "Secret(***)");
        assert!(!debug_str.contains("hunter2"));
    }

    /// Validates `Secret` display rendering for the redaction scenario.
    ///
    /// Assertions:
    /// - Confirms `display_str` equals `"***"`.
    /// - Ensures `!display_str.contains("hunter2")` evaluates to true.
    #[test]
    fn test_secret_display_redacts() {
        let secret = Secret::new("hunter2");
        let display_str = format!("{secret}");
        assert_eq!(display_str, "***");
        assert!(!display_str.contains("hunter2"));
    }

    /// Validates `Secret` equality for the content comparison scenario.
    ///
    /// Assertions:
    /// - Confirms two secrets wrapping the same value compare equal.
    /// - Confirms secrets wrapping different values compare unequal.
    #[test]
    fn test_secret_equality_compares_content() {
        assert_eq!(Secret::new("same"), Secret::new("same"));
        assert_ne!(Secret::new("same"), Secret::new("different"));
    }

    /// Validates `Secret` deserialization for the transparent TOML scenario.
    ///
    /// Assertions:
    /// - Confirms a plain TOML string maps onto a `Secret` field.
    #[test]
    fn test_secret_transparent_deserialization() {
        #[derive(Deserialize)]
        struct Record {
            token: Secret,
        }

        let record: Record = toml::from_str(r#"token = "abc123""#).unwrap();
        assert_eq!(record.token, Secret::new("abc123"));
    }

    /// Validates `Secret::default` behavior for the empty value scenario.
    ///
    /// Assertions:
    /// - Ensures `Secret::default().is_empty()` evaluates to true.
    #[test]
    fn test_secret_default_is_empty() {
        assert!(Secret::default().is_empty());
    }
}
