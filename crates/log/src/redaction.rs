//! Secret wrapper and bulk redaction.
//!
//! The redaction contract is enforced at the formatter layer, not by
//! caller discipline: every standard rendering path of a [`Secret`]
//! (`Display`, `Debug`, `Serialize`) yields the sentinel, so rotation code
//! can format arbitrary identifiers without leaking plaintext.

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

/// The sentinel substituted for secret material in any rendered output.
pub const REDACTED: &str = "[REDACTED]";

/// A string value that refuses to print itself.
///
/// Backed by [`secrecy::SecretString`] so the plaintext is zeroed on drop.
/// The value is only reachable through [`Secret::expose`] /
/// [`Secret::with_exposed`].
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the plaintext (use with caution)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Run a closure over the plaintext without letting it escape
    pub fn with_exposed<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Length of the underlying value
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Whether the underlying value is empty
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

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

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

/// Replace every occurrence of each known secret in `input`.
///
/// Secrets of length 3 or shorter are skipped: substituting them would
/// mangle unrelated text far more often than it would protect anything.
pub fn redact<S: AsRef<str>>(input: &str, secrets: &[S]) -> String {
    let mut out = input.to_string();
    for secret in secrets {
        let secret = secret.as_ref();
        if secret.len() > 3 {
            out = out.replace(secret, REDACTED);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug_are_redacted() {
        let s = Secret::new("super-secret-password");
        assert_eq!(format!("{s}"), REDACTED);
        assert_eq!(format!("{s:?}"), REDACTED);
    }

    #[test]
    fn serialize_is_redacted() {
        let s = Secret::new("super-secret-password");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, format!("\"{REDACTED}\""));
    }

    #[test]
    fn expose_returns_plaintext() {
        let s = Secret::new("value");
        assert_eq!(s.expose(), "value");
        assert_eq!(s.with_exposed(str::len), 5);
        assert_eq!(s.len(), 5);
        assert!(!s.is_empty());
    }

    #[test]
    fn redact_replaces_long_secrets() {
        let out = redact("password=hunter2! token=abcd", &["hunter2!", "abcd"]);
        assert_eq!(out, format!("password={REDACTED} token={REDACTED}"));
    }

    #[test]
    fn redact_skips_short_and_empty_secrets() {
        let out = redact("a=x b=yz c=pqr", &["x", "yz", "pqr", ""]);
        assert_eq!(out, "a=x b=yz c=pqr");
    }

    #[test]
    fn redact_replaces_every_occurrence() {
        let out = redact("tok1 tok1 tok1", &["tok1"]);
        assert_eq!(out, "[REDACTED] [REDACTED] [REDACTED]");
    }
}
