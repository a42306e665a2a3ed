//! Zero-downtime rotation via a secondary credential.
//!
//! The phase machine is strictly sequential: gate on the minimum rotation
//! interval, create a secondary credential, verify it, promote it, then
//! schedule deprecation of the old primary. A secondary that fails
//! verification is cleaned up best-effort (zero grace, hard delete)
//! without changing the failure outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dsops_catalog::ServiceCatalog;
use dsops_core::{
    Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo, SecretInfo,
    SecretKind, SecretReference, VerificationResult, VerificationTest,
    verification::all_required_passed,
};
use tracing::warn;

use crate::rotator::{DeprecateOptions, PromoteOptions, Rotator};
use crate::strategy::chrono_duration;

/// Default verification timeout
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period before the old primary is retired
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(24 * 3600);

/// Kinds that can meaningfully hold two live credentials
const SUPPORTED_KINDS: [SecretKind; 5] = [
    SecretKind::Password,
    SecretKind::ApiKey,
    SecretKind::Oauth,
    SecretKind::Certificate,
    SecretKind::Encryption,
];

/// Two-secret (zero-downtime) rotation over a two-secret-capable base
pub struct TwoSecretStrategy {
    name: String,
    base: Box<dyn Rotator>,
}

impl TwoSecretStrategy {
    /// Wrap a base rotator.
    ///
    /// A base without the two-secret extension still works: rotation
    /// falls back to a single-phase base rotation with a warning.
    pub fn new(base: Box<dyn Rotator>) -> Self {
        let name = format!("two-secret-{}", base.name());
        Self { name, base }
    }

    fn verify_timeout(tests: &[VerificationTest]) -> Duration {
        tests
            .iter()
            .filter_map(|t| t.timeout)
            .max()
            .unwrap_or(DEFAULT_VERIFY_TIMEOUT)
    }

    async fn fallback_single_phase(
        &self,
        request: &RotationRequest,
        mut result: RotationResult,
    ) -> Result<RotationResult> {
        result.audit(
            "fallback_single_phase",
            &self.name,
            "started",
            format!(
                "base rotator `{}` does not implement two-secret rotation",
                self.base.name()
            ),
        );
        match self.base.rotate(request).await {
            Ok(base_result) => result.merge_from(base_result),
            Err(e) => {
                result.audit("rotation_failed", &self.name, "failed", e.to_string());
                result.fail(e.to_string());
                return Ok(result);
            }
        }
        result.warn(
            "two-secret rotation unavailable for this base rotator; performed single-phase rotation",
        );
        if result.status == RotationStatus::Completed && result.rotated_at.is_none() {
            result.rotated_at = Some(Utc::now());
        }
        Ok(result)
    }
}

#[async_trait]
impl Rotator for TwoSecretStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_secret(&self, secret: &SecretInfo) -> bool {
        SUPPORTED_KINDS.contains(&secret.kind) && self.base.supports_secret(secret)
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "two_secret_rotation_started",
            &self.name,
            "started",
            format!("zero-downtime rotation of `{}`", request.secret.key),
        );

        if request.dry_run {
            result.audit(
                "dry_run",
                &self.name,
                "completed",
                "simulated rotation; no secondary credential was created",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        let Some(two_secret) = self.base.as_two_secret() else {
            return self.fallback_single_phase(request, result).await;
        };

        // Phase 1: interval gate.
        let status = match self.base.get_status(&request.secret).await {
            Ok(status) => status,
            Err(e) => {
                result.audit("interval_gate", &self.name, "failed", e.to_string());
                result.fail(format!("cannot read rotation status: {e}"));
                return Ok(result);
            }
        };
        let min_interval = request
            .secret
            .constraints
            .as_ref()
            .and_then(|c| c.min_rotation_interval);
        if !request.force {
            if let (Some(last), Some(min)) = (status.last_rotated, min_interval) {
                if Utc::now() - last < chrono_duration(min) {
                    result.audit(
                        "interval_gate",
                        &self.name,
                        "skipped",
                        format!("last rotation at {last} is within the minimum interval"),
                    );
                    result.status = RotationStatus::Pending;
                    result.error = Some(format!(
                        "minimum rotation interval not elapsed: last rotated at {last}; use force to override"
                    ));
                    return Ok(result);
                }
            }
        }

        // Phase 2: create the secondary.
        result.audit(
            "create_secondary",
            &self.name,
            "started",
            "creating secondary credential",
        );
        let secondary = match two_secret.create_secondary_secret(request).await {
            Ok(secondary) => secondary,
            Err(e) => {
                result.audit("create_secondary", &self.name, "failed", e.to_string());
                result.fail(format!("failed to create secondary credential: {e}"));
                return Ok(result);
            }
        };
        result.audit(
            "create_secondary",
            &self.name,
            "completed",
            "secondary credential created",
        );

        // Phase 3: verify the secondary before anything depends on it.
        let tests = request
            .secret
            .constraints
            .as_ref()
            .map(|c| c.required_tests.clone())
            .unwrap_or_default();
        result.audit(
            "verify_secondary",
            &self.name,
            "started",
            format!("running {} verification test(s)", tests.len()),
        );
        let verification = tokio::time::timeout(
            Self::verify_timeout(&tests),
            self.base.verify(&request.secret, &secondary, &tests),
        )
        .await;

        let outcomes: Option<Vec<VerificationResult>> = match verification {
            Ok(Ok(outcomes)) if all_required_passed(&outcomes) => Some(outcomes),
            Ok(Ok(outcomes)) => {
                result.audit(
                    "verify_secondary",
                    &self.name,
                    "failed",
                    "required verification test failed",
                );
                result.verification_results.extend(outcomes);
                None
            }
            Ok(Err(e)) => {
                result.audit("verify_secondary", &self.name, "failed", e.to_string());
                None
            }
            Err(_) => {
                result.audit(
                    "verify_secondary",
                    &self.name,
                    "failed",
                    "verification timed out",
                );
                None
            }
        };

        let Some(outcomes) = outcomes else {
            // Best-effort cleanup of the unverified secondary; the failure
            // outcome of this phase does not change if cleanup also fails.
            match two_secret
                .deprecate_primary_secret(&request.secret, &DeprecateOptions::immediate())
                .await
            {
                Ok(()) => result.audit(
                    "cleanup_secondary",
                    &self.name,
                    "completed",
                    "removed unverified secondary credential",
                ),
                Err(e) => {
                    warn!(secret = %request.secret.key, error = %e, "cleanup of unverified secondary failed");
                    result.audit("cleanup_secondary", &self.name, "failed", e.to_string());
                }
            }
            result.fail("secondary credential failed verification");
            return Ok(result);
        };
        result.verification_results.extend(outcomes);
        result.audit(
            "verify_secondary",
            &self.name,
            "completed",
            "secondary credential verified",
        );

        // Phase 4: promote. Verification already happened, so skip it here.
        let grace_period = request
            .secret
            .constraints
            .as_ref()
            .and_then(|c| c.grace_period)
            .unwrap_or(DEFAULT_GRACE_PERIOD);
        result.audit(
            "promote_secondary",
            &self.name,
            "started",
            "promoting secondary credential to primary",
        );
        if let Err(e) = two_secret
            .promote_secondary_secret(
                &request.secret,
                &secondary,
                &PromoteOptions {
                    grace_period,
                    verify_first: false,
                },
            )
            .await
        {
            result.audit("promote_secondary", &self.name, "failed", e.to_string());
            result.fail(format!("failed to promote secondary credential: {e}"));
            return Ok(result);
        }
        result.audit(
            "promote_secondary",
            &self.name,
            "completed",
            "secondary credential is now primary",
        );

        // Phase 5: schedule deprecation of the old primary.
        let expires_at = Utc::now() + chrono_duration(grace_period);
        result.expires_at = Some(expires_at);
        result.audit(
            "schedule_deprecation",
            &self.name,
            "completed",
            format!("old primary deprecates at {expires_at}"),
        );

        result.complete(secondary);
        result.audit(
            "rotation_completed",
            &self.name,
            "completed",
            "zero-downtime rotation finished",
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
