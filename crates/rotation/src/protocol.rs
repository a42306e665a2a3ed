//! Wire shapes shared by the webhook and script rotators.
//!
//! Both delegation paths speak the same JSON contract: a request carrying
//! the action and full rotation context, and a response reporting success
//! plus the new credential reference. The script path additionally
//! receives the execution environment and, when a catalog is attached,
//! the credential kind's schema.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dsops_catalog::KindConstraints;
use dsops_core::{NewSecretValue, RotationRequest, SecretInfo, SecretReference};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request JSON handed to a webhook endpoint or a script's stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRequest {
    /// What to do: `rotate`, `verify`, `rollback`
    pub action: String,

    /// The secret being operated on
    pub secret_info: SecretInfo,

    /// Simulate without side effects
    pub dry_run: bool,

    /// Interval gating was overridden
    pub force: bool,

    /// Replacement value specification, if the caller provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<NewSecretValue>,

    /// Opaque per-request configuration
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,

    /// When the request was issued
    pub timestamp: DateTime<Utc>,

    /// Execution environment (script path only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Credential-kind schema (script path, when a catalog is attached)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_metadata: Option<SchemaMetadata>,
}

impl ProtocolRequest {
    /// Request for an action, copying context out of the rotation request
    pub fn for_action(action: impl Into<String>, request: &RotationRequest) -> Self {
        Self {
            action: action.into(),
            secret_info: request.secret.clone(),
            dry_run: request.dry_run,
            force: request.force,
            new_value: request.new_value.clone(),
            config: request.config.clone(),
            timestamp: Utc::now(),
            environment: None,
            schema_metadata: None,
        }
    }
}

/// Credential-kind schema surfaced to scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Service-type name
    pub service_type: String,

    /// Credential kind within the service type
    pub credential_kind: String,

    /// Declared capabilities, in wire form
    pub capabilities: Vec<String>,

    /// Constraints on values of this kind
    pub constraints: KindConstraints,
}

/// Response JSON from a webhook endpoint or a script's stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolResponse {
    /// Whether the action succeeded
    pub success: bool,

    /// Optional human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Reference to the new credential, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_secret_ref: Option<SecretReference>,

    /// Error message, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Non-fatal observations to surface in the result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Extra key/value output to surface in the result
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ProtocolResponse {
    /// The failure message: `error` first, then `message`, then a stock text
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "delegated rotation reported failure".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsops_core::SecretKind;
    use serde_json::json;

    #[test]
    fn request_serializes_expected_fields() {
        let rotation = RotationRequest::new(SecretInfo::new("vault", "k", SecretKind::ApiKey))
            .with_config("endpoint", json!("https://example.test"));
        let request = ProtocolRequest::for_action("rotate", &rotation);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["action"], "rotate");
        assert_eq!(value["secret_info"]["key"], "k");
        assert_eq!(value["dry_run"], false);
        assert_eq!(value["config"]["endpoint"], "https://example.test");
        assert!(value.get("environment").is_none());
    }

    #[test]
    fn response_defaults_tolerate_sparse_json() {
        let response: ProtocolResponse =
            serde_json::from_str(r#"{"success": false, "error": "nope"}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.failure_message(), "nope");
        assert!(response.warnings.is_empty());

        let bare: ProtocolResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(bare.failure_message(), "delegated rotation reported failure");
    }
}
