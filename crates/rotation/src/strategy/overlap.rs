//! Time-window rotation for expiring credential kinds.
//!
//! Old and new credentials stay valid simultaneously for a bounded
//! overlap window, so clients migrate at their own pace. The validity
//! window and overlap period come from the secret's constraints, with
//! 90-day / 7-day defaults.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dsops_catalog::ServiceCatalog;
use dsops_core::{
    Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo, SecretInfo,
    SecretKind, SecretReference, VerificationResult, VerificationTest,
};
use serde_json::json;

use crate::rotator::Rotator;
use crate::strategy::chrono_duration;

/// Default overlap window
pub const DEFAULT_OVERLAP: Duration = Duration::from_secs(7 * 24 * 3600);

/// Default total validity of an issued credential
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(90 * 24 * 3600);

/// Overlap (time-window) rotation over any base rotator
pub struct OverlapStrategy {
    name: String,
    base: Box<dyn Rotator>,
}

impl OverlapStrategy {
    /// Wrap a base rotator
    pub fn new(base: Box<dyn Rotator>) -> Self {
        let name = format!("overlap-{}", base.name());
        Self { name, base }
    }

    /// `(overlap, validity)` windows for a secret
    fn windows(secret: &SecretInfo) -> (Duration, Duration) {
        let constraints = secret.constraints.as_ref();
        (
            constraints
                .and_then(|c| c.overlap_period)
                .unwrap_or(DEFAULT_OVERLAP),
            constraints
                .and_then(|c| c.total_validity)
                .unwrap_or(DEFAULT_VALIDITY),
        )
    }
}

#[async_trait]
impl Rotator for OverlapStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_secret(&self, secret: &SecretInfo) -> bool {
        let kind_ok = match secret.kind {
            SecretKind::Certificate => true,
            SecretKind::ApiKey | SecretKind::Oauth => {
                secret.meta("supports_expiration") == Some("true")
            }
            _ => false,
        };
        kind_ok && self.base.supports_secret(secret)
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "overlap_rotation_started",
            &self.name,
            "started",
            format!("time-window rotation of `{}`", request.secret.key),
        );

        if request.dry_run {
            result.audit(
                "dry_run",
                &self.name,
                "completed",
                "simulated rotation; no overlapping credential was issued",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        if !request.force {
            let status = match self.base.get_status(&request.secret).await {
                Ok(status) => status,
                Err(e) => {
                    result.audit("window_gate", &self.name, "failed", e.to_string());
                    result.fail(format!("cannot read rotation status: {e}"));
                    return Ok(result);
                }
            };
            if let Some(next) = status.next_rotation {
                if Utc::now() < next {
                    result.audit(
                        "window_gate",
                        &self.name,
                        "skipped",
                        format!("next rotation window opens at {next}"),
                    );
                    result.status = RotationStatus::Pending;
                    result.error = Some(format!(
                        "rotation window not open until {next}; use force to override"
                    ));
                    return Ok(result);
                }
            }
        }

        let (overlap, validity) = Self::windows(&request.secret);
        let now = Utc::now();
        let valid_until = now + chrono_duration(validity);
        let overlap_until = now + chrono_duration(overlap);
        let next_rotation = now + chrono_duration(validity) - chrono_duration(overlap) * 2;

        let mut delegated = request.clone();
        delegated
            .config
            .insert("valid_from".into(), json!(now.to_rfc3339()));
        delegated
            .config
            .insert("valid_until".into(), json!(valid_until.to_rfc3339()));
        delegated
            .config
            .insert("overlap_with_previous".into(), json!(overlap.as_secs()));

        let base_result = match self.base.rotate(&delegated).await {
            Ok(base_result) => base_result,
            Err(e) => {
                result.audit("rotation_failed", &self.name, "failed", e.to_string());
                result.fail(e.to_string());
                return Ok(result);
            }
        };
        result.merge_from(base_result);

        if result.status != RotationStatus::Completed {
            result.audit(
                "rotation_failed",
                &self.name,
                "failed",
                result.error.clone().unwrap_or_default(),
            );
            return Ok(result);
        }

        if let Some(reference) = result.new_secret_ref.as_mut() {
            reference
                .metadata
                .insert("next_rotation".into(), next_rotation.to_rfc3339());
            reference
                .metadata
                .insert("expires_at".into(), valid_until.to_rfc3339());
        }
        result.expires_at = Some(valid_until);
        result.warn(format!(
            "previous and new credentials are both valid until {overlap_until}"
        ));
        result.audit(
            "overlap_rotation_completed",
            &self.name,
            "completed",
            format!("new credential valid until {valid_until}"),
        );
        Ok(result)
    }

    async fn verify(
        &self,
        secret: &SecretInfo,
        reference: &SecretReference,
        tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>> {
        self.base.verify(secret, reference, tests).await
    }

    async fn rollback(&self, secret: &SecretInfo, previous: &SecretReference) -> Result<()> {
        self.base.rollback(secret, previous).await
    }

    async fn get_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo> {
        let mut status = self.base.get_status(secret).await?;
        if let Some(last) = status.last_rotated {
            let (overlap, validity) = Self::windows(secret);
            status.next_rotation =
                Some(last + chrono_duration(validity) - chrono_duration(overlap) * 2);
        }
        Ok(status)
    }

    fn set_repository(&mut self, catalog: Arc<ServiceCatalog>) {
        self.base.set_repository(catalog);
    }
}
