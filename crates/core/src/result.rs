//! Rotation outcomes and the audit trail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::{SecretInfo, SecretReference};
use crate::verification::VerificationResult;

/// Lifecycle state of a rotation (or of a secret, in status queries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStatus {
    /// Not yet performed (also the dry-run outcome)
    #[default]
    Pending,
    /// Replacement in progress
    Rotating,
    /// Replacement done, checks running
    Verifying,
    /// Rotation finished successfully
    Completed,
    /// Rotation failed
    Failed,
    /// Reverted to the previous credential
    RolledBack,
    /// Old credential retired after its grace period
    Deprecated,
}

impl RotationStatus {
    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStatus::Pending => "pending",
            RotationStatus::Rotating => "rotating",
            RotationStatus::Verifying => "verifying",
            RotationStatus::Completed => "completed",
            RotationStatus::Failed => "failed",
            RotationStatus::RolledBack => "rolled_back",
            RotationStatus::Deprecated => "deprecated",
        }
    }
}

impl std::fmt::Display for RotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observable step in a rotation. Appended, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the step happened
    pub timestamp: DateTime<Utc>,

    /// Machine-readable action tag (`rotation_started`, `promote`, …)
    pub action: String,

    /// Component that performed the step
    pub component: String,

    /// Step status (`started`, `completed`, `failed`, `skipped`)
    pub status: String,

    /// Human-readable message
    pub message: String,

    /// Step-specific details
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

impl AuditEntry {
    /// New entry stamped now
    pub fn new(
        action: impl Into<String>,
        component: impl Into<String>,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            component: component.into(),
            status: status.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Attach a detail
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Outcome record produced by every rotate call and persisted in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationResult {
    /// The secret the rotation was for
    pub secret: SecretInfo,

    /// Final status
    pub status: RotationStatus,

    /// Reference to the new value; always set when `status` is completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_secret_ref: Option<SecretReference>,

    /// Reference to the previous value, where known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_secret_ref: Option<SecretReference>,

    /// When the replacement took effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,

    /// When the old (or overlapping) credential stops being valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Outcomes of post-rotation checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_results: Vec<VerificationResult>,

    /// Error message when `status` is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Non-fatal observations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Ordered, append-only trail of observable steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_trail: Vec<AuditEntry>,
}

impl RotationResult {
    /// Fresh pending result for a secret
    pub fn new(secret: SecretInfo) -> Self {
        Self {
            secret,
            status: RotationStatus::Pending,
            new_secret_ref: None,
            old_secret_ref: None,
            rotated_at: None,
            expires_at: None,
            verification_results: Vec::new(),
            error: None,
            warnings: Vec::new(),
            audit_trail: Vec::new(),
        }
    }

    /// Append an audit entry
    pub fn audit(
        &mut self,
        action: impl Into<String>,
        component: impl Into<String>,
        status: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.audit_trail
            .push(AuditEntry::new(action, component, status, message));
    }

    /// Append a pre-built audit entry
    pub fn push_audit(&mut self, entry: AuditEntry) {
        self.audit_trail.push(entry);
    }

    /// Append a warning
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Mark completed with the new reference, stamping `rotated_at` now if unset
    pub fn complete(&mut self, new_ref: SecretReference) {
        self.status = RotationStatus::Completed;
        self.new_secret_ref = Some(new_ref);
        if self.rotated_at.is_none() {
            self.rotated_at = Some(Utc::now());
        }
    }

    /// Mark failed with an error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RotationStatus::Failed;
        self.error = Some(error.into());
    }

    /// Absorb another result's trail, warnings, and verification outcomes.
    ///
    /// Ordering within each source trail is preserved; the absorbed trail is
    /// appended after the entries already present.
    pub fn merge_from(&mut self, other: RotationResult) {
        let RotationResult {
            status,
            new_secret_ref,
            old_secret_ref,
            rotated_at,
            expires_at,
            verification_results,
            error,
            warnings,
            audit_trail,
            ..
        } = other;
        self.status = status;
        self.new_secret_ref = new_secret_ref;
        self.old_secret_ref = old_secret_ref;
        self.rotated_at = rotated_at;
        self.expires_at = expires_at;
        self.verification_results.extend(verification_results);
        self.error = error;
        self.warnings.extend(warnings);
        self.audit_trail.extend(audit_trail);
    }
}

/// Derived state for a secret, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationStatusInfo {
    /// Last known rotation status
    pub status: RotationStatus,

    /// When the secret was last rotated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotated: Option<DateTime<Utc>>,

    /// Earliest time the next rotation should run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_rotation: Option<DateTime<Utc>>,

    /// Whether a rotation may run now
    pub can_rotate: bool,

    /// Why (or why not)
    #[serde(default)]
    pub reason: String,
}

impl RotationStatusInfo {
    /// Status for a secret with no recorded history
    pub fn unseen() -> Self {
        Self {
            status: RotationStatus::Pending,
            last_rotated: None,
            next_rotation: None,
            can_rotate: true,
            reason: "No rotation history found".to_string(),
        }
    }

    /// Status derived from a persisted result
    pub fn from_result(result: &RotationResult) -> Self {
        Self {
            status: result.status,
            last_rotated: result.rotated_at,
            next_rotation: None,
            can_rotate: true,
            reason: String::new(),
        }
    }
}
