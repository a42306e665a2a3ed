//! Declarative service-type schema.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A declared operation a credential kind supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create a new credential alongside existing ones
    Create,
    /// Replace a credential in place
    Rotate,
    /// Check a credential works
    Verify,
    /// Retire a credential
    Revoke,
}

impl Capability {
    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::Rotate => "rotate",
            Capability::Verify => "verify",
            Capability::Revoke => "revoke",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum simultaneously-active credentials of a kind.
///
/// The catalog format allows either an integer or the literal string
/// `"unlimited"`; the sentinel is normalized to −1 at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxActive(i64);

impl MaxActive {
    /// The unlimited sentinel
    pub const UNLIMITED: MaxActive = MaxActive(-1);

    /// A concrete limit
    pub fn limit(n: u32) -> Self {
        MaxActive(i64::from(n))
    }

    /// Whether no limit applies
    pub fn is_unlimited(&self) -> bool {
        self.0 < 0
    }

    /// The normalized value; −1 means unlimited
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Default for MaxActive {
    fn default() -> Self {
        MaxActive::UNLIMITED
    }
}

impl Serialize for MaxActive {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_unlimited() {
            serializer.serialize_str("unlimited")
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for MaxActive {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Number(n) => n
                .as_i64()
                .filter(|v| *v >= 0)
                .map(MaxActive)
                .ok_or_else(|| serde::de::Error::custom("maxActive must be a non-negative integer")),
            serde_json::Value::String(s) => {
                if s.eq_ignore_ascii_case("unlimited") {
                    Ok(MaxActive::UNLIMITED)
                } else if let Ok(v) = s.parse::<i64>() {
                    if v >= 0 {
                        Ok(MaxActive(v))
                    } else {
                        Err(serde::de::Error::custom(
                            "maxActive must be a non-negative integer",
                        ))
                    }
                } else {
                    Err(serde::de::Error::custom(format!(
                        "unknown maxActive token: {s:?}"
                    )))
                }
            }
            other => Err(serde::de::Error::custom(format!(
                "maxActive must be an integer or \"unlimited\", got {other}"
            ))),
        }
    }
}

/// Constraints on a credential kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KindConstraints {
    /// Maximum simultaneously-active credentials
    #[serde(default)]
    pub max_active: MaxActive,

    /// Default TTL as a duration string (`"1h"`, `"7d"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    /// Regular expression a value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A named credential family within a service type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CredentialKindDef {
    /// Operations the target service supports for this kind
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,

    /// Constraints on values of this kind
    #[serde(default)]
    pub constraints: KindConstraints,
}

impl CredentialKindDef {
    /// Kind with the given capabilities and default constraints
    pub fn with_capabilities(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
            constraints: KindConstraints::default(),
        }
    }

    /// Whether the kind declares a capability
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Per-service defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServiceDefaults {
    /// Requests per minute the target tolerates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,

    /// Strategy to use when the request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_strategy: Option<String>,
}

/// Descriptive header of a service type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeMetadata {
    /// Unique service-type name (`postgresql`, `stripe`)
    pub name: String,

    /// Category driving protocol adapter selection (`database`, `api`)
    pub category: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Declarative target-service schema. Loaded at startup, read-only after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    /// Name, category, description
    pub metadata: ServiceTypeMetadata,

    /// Credential kinds by name
    #[serde(default)]
    pub credential_kinds: BTreeMap<String, CredentialKindDef>,

    /// Per-service defaults
    #[serde(default)]
    pub defaults: ServiceDefaults,
}

impl ServiceType {
    /// Start building a service type
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            metadata: ServiceTypeMetadata {
                name: name.into(),
                category: category.into(),
                description: String::new(),
            },
            credential_kinds: BTreeMap::new(),
            defaults: ServiceDefaults::default(),
        }
    }

    /// Add a credential kind
    pub fn with_kind(mut self, name: impl Into<String>, def: CredentialKindDef) -> Self {
        self.credential_kinds.insert(name.into(), def);
        self
    }

    /// Set the default rotation strategy
    pub fn with_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.defaults.rotation_strategy = Some(strategy.into());
        self
    }

    /// Look up a credential kind
    pub fn kind(&self, name: &str) -> Option<&CredentialKindDef> {
        self.credential_kinds.get(name)
    }

    /// The service-type name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
