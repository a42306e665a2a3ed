//! Authorization subjects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Permission set attached to a principal.
///
/// Empty allow-lists mean "anything"; the TTL cap is a duration string
/// checked at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Permissions {
    /// Service types this principal may rotate; empty allows all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_services: Vec<String>,

    /// Credential kinds this principal may rotate; empty allows all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_credential_kinds: Vec<String>,

    /// Longest TTL this principal may request (`"1h"`, `"7d"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_credential_ttl: Option<String>,
}

/// The subject on whose behalf a rotation is attempted. Read-only at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique principal name
    pub name: String,

    /// Kind of subject (`user`, `service-account`, `pipeline`)
    #[serde(default)]
    pub principal_type: String,

    /// Contact address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Owning team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    /// Home environment (`production`, `staging`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Permissions; absent means no specific restrictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Free-form metadata, including the multi-environment list
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Principal {
    /// Principal with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            principal_type: String::new(),
            email: None,
            team: None,
            environment: None,
            permissions: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the home environment
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the permission set
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The `metadata["environments"]` list, when present and well-formed
    pub fn environments(&self) -> Vec<&str> {
        self.metadata
            .get("environments")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}
