//! Single-phase replacement.
//!
//! The simplest pattern: replace the credential in place and verify
//! afterwards. There is an unavoidable window where clients may still
//! present the retired credential, so every successful rotation carries a
//! downtime warning.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dsops_catalog::ServiceCatalog;
use dsops_core::{
    Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo, SecretInfo,
    SecretReference, VerificationResult, VerificationTest,
    verification::all_required_passed,
};

use crate::rotator::Rotator;

/// Immediate (single-phase) rotation over any base rotator
pub struct ImmediateStrategy {
    name: String,
    base: Box<dyn Rotator>,
}

impl ImmediateStrategy {
    /// Wrap a base rotator
    pub fn new(base: Box<dyn Rotator>) -> Self {
        let name = format!("immediate-{}", base.name());
        Self { name, base }
    }
}

#[async_trait]
impl Rotator for ImmediateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_secret(&self, secret: &SecretInfo) -> bool {
        self.base.supports_secret(secret)
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "immediate_rotation_started",
            &self.name,
            "started",
            format!("single-phase rotation of `{}`", request.secret.key),
        );

        if request.dry_run {
            result.audit(
                "dry_run",
                &self.name,
                "completed",
                "simulated rotation; base rotator was not invoked",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        result.audit(
            "generating_new_value",
            &self.name,
            "started",
            "requesting replacement value from base rotator",
        );
        result.audit(
            "backup_current",
            &self.name,
            "completed",
            "captured reference to the current value",
        );
        let backup = SecretReference::for_secret(&request.secret);

        let base_result = match self.base.rotate(request).await {
            Ok(base_result) => base_result,
            Err(e) => {
                result.audit("rotation_failed", &self.name, "failed", e.to_string());
                result.fail(e.to_string());
                return Ok(result);
            }
        };

        result.merge_from(base_result);
        if result.old_secret_ref.is_none() {
            result.old_secret_ref = Some(backup);
        }

        if result.status == RotationStatus::Failed {
            result.audit(
                "rotation_failed",
                &self.name,
                "failed",
                result.error.clone().unwrap_or_default(),
            );
            return Ok(result);
        }

        result.audit(
            "verifying_new_secret",
            &self.name,
            "started",
            "running post-rotation checks",
        );
        let tests = request
            .secret
            .constraints
            .as_ref()
            .map(|c| c.required_tests.clone())
            .unwrap_or_default();
        if let (Some(reference), false) = (result.new_secret_ref.clone(), tests.is_empty()) {
            match self.base.verify(&request.secret, &reference, &tests).await {
                Ok(outcomes) => {
                    let passed = all_required_passed(&outcomes);
                    result.verification_results.extend(outcomes);
                    if !passed {
                        result.audit(
                            "rotation_failed",
                            &self.name,
                            "failed",
                            "required verification failed after rotation",
                        );
                        result.fail("required verification failed after rotation");
                        return Ok(result);
                    }
                }
                Err(e) => {
                    result.audit("rotation_failed", &self.name, "failed", e.to_string());
                    result.fail(format!("verification error: {e}"));
                    return Ok(result);
                }
            }
        }

        if result.status == RotationStatus::Completed && result.rotated_at.is_none() {
            result.rotated_at = Some(Utc::now());
        }
        result.warn(
            "immediate rotation may cause brief downtime while clients pick up the new credential",
        );
        result.audit(
            "rotation_completed",
            &self.name,
            "completed",
            "single-phase rotation finished",
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
        self.base.get_status(secret).await
    }

    fn set_repository(&mut self, catalog: Arc<ServiceCatalog>) {
        self.base.set_repository(catalog);
    }
}
