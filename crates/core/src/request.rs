//! Rotation request input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::secret::SecretInfo;

/// Specification of the replacement value.
///
/// A request may carry an explicit value, generator parameters, or nothing
/// at all (the rotator's default applies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewSecretValue {
    /// Use this exact value instead of generating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,

    /// Length of generated material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl NewSecretValue {
    /// An explicit value
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            literal: Some(value.into()),
            length: None,
        }
    }

    /// Generated material of the given length
    pub fn generated(length: usize) -> Self {
        Self {
            literal: None,
            length: Some(length),
        }
    }
}

/// Input to the rotation engine. Constructed by the caller, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRequest {
    /// The secret to rotate
    pub secret: SecretInfo,

    /// Strategy name; `None` asks the engine to auto-select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Replacement value specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<NewSecretValue>,

    /// Simulate without side effects
    #[serde(default)]
    pub dry_run: bool,

    /// Override interval gating and not-before timestamps
    #[serde(default)]
    pub force: bool,

    /// Prefer the two-secret zero-downtime path
    #[serde(default)]
    pub two_secret: bool,

    /// Opaque per-request configuration handed to rotators
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,

    /// Channels to notify on completion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<String>,
}

impl RotationRequest {
    /// Request with defaults for everything but the secret
    pub fn new(secret: SecretInfo) -> Self {
        Self {
            secret,
            strategy: None,
            new_value: None,
            dry_run: false,
            force: false,
            two_secret: false,
            config: Map::new(),
            notify: Vec::new(),
        }
    }

    /// Select a strategy by name
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Set the replacement value specification
    pub fn with_new_value(mut self, value: NewSecretValue) -> Self {
        self.new_value = Some(value);
        self
    }

    /// Set a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Mark as a dry run
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Mark as forced
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Configuration value as a string, if present and a string
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretKind;
    use serde_json::json;

    #[test]
    fn defaults_are_minimal() {
        let request = RotationRequest::new(SecretInfo::new("vault", "k", SecretKind::Generic));
        assert!(request.strategy.is_none());
        assert!(!request.dry_run);
        assert!(!request.force);
        assert!(request.config.is_empty());
    }

    #[test]
    fn config_str_reads_strings_only() {
        let request = RotationRequest::new(SecretInfo::new("vault", "k", SecretKind::Generic))
            .with_config("endpoint", json!("https://example.test/rotate"))
            .with_config("attempts", json!(3));
        assert_eq!(
            request.config_str("endpoint"),
            Some("https://example.test/rotate")
        );
        assert_eq!(request.config_str("attempts"), None);
        assert_eq!(request.config_str("missing"), None);
    }

    #[test]
    fn request_round_trips() {
        let request = RotationRequest::new(SecretInfo::new("vault", "k", SecretKind::Password))
            .with_strategy("two-secret-random")
            .with_new_value(NewSecretValue::generated(48))
            .forced();
        let json = serde_json::to_string(&request).unwrap();
        let back: RotationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
