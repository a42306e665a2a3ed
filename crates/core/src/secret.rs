//! Secret identity, references, and rotation constraints.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::verification::VerificationTest;

/// Family of credential being rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    /// Database or service account password
    Password,
    /// API key
    ApiKey,
    /// X.509 certificate
    Certificate,
    /// OAuth token or client secret
    Oauth,
    /// Encryption key material
    Encryption,
    /// Anything else
    #[default]
    Generic,
}

impl SecretKind {
    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKind::Password => "password",
            SecretKind::ApiKey => "api_key",
            SecretKind::Certificate => "certificate",
            SecretKind::Oauth => "oauth",
            SecretKind::Encryption => "encryption",
            SecretKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being rotated.
///
/// Identity is the `(provider, key)` pair; everything else is descriptive.
/// Immutable for the duration of a rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretInfo {
    /// Logical key of the secret within its provider
    pub key: String,

    /// Name of the provider that stores the secret
    pub provider: String,

    /// Provider-specific reference (ARN, path, resource id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,

    /// Kind of credential
    #[serde(default)]
    pub kind: SecretKind,

    /// Free-form string metadata (service type, script path, webhook URL…)
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Optional rotation constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<RotationConstraints>,
}

impl SecretInfo {
    /// Minimal secret identity
    pub fn new(provider: impl Into<String>, key: impl Into<String>, kind: SecretKind) -> Self {
        Self {
            key: key.into(),
            provider: provider.into(),
            provider_ref: None,
            kind,
            metadata: HashMap::new(),
            constraints: None,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach rotation constraints
    pub fn with_constraints(mut self, constraints: RotationConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Look up a metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// `"<provider>:<key>"`, the identity used by history storage
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.provider, self.key)
    }
}

/// Constraints a rotation must honor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RotationConstraints {
    /// Minimum interval between rotations
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub min_rotation_interval: Option<Duration>,

    /// How long the previous credential stays valid after promotion
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<Duration>,

    /// Window during which old and new credentials are both valid
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub overlap_period: Option<Duration>,

    /// Total validity of an issued credential
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub total_validity: Option<Duration>,

    /// Post-rotation checks that must pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tests: Vec<VerificationTest>,
}

/// Addresses a concrete stored value.
///
/// A reference is sufficient to re-locate the value without any in-memory
/// handle; rotators return one for the new credential and, where known,
/// the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretReference {
    /// Provider that stores the value
    pub provider: String,

    /// Logical key within the provider
    pub key: String,

    /// Provider version label, if versioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Opaque identifier assigned at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Reference-level metadata (expiry annotations, serials…)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SecretReference {
    /// Reference to the current value of a secret
    pub fn for_secret(secret: &SecretInfo) -> Self {
        Self {
            provider: secret.provider.clone(),
            key: secret.key.clone(),
            version: None,
            id: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the provider version label
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the opaque identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
