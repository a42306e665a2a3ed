//! The rotator contract.
//!
//! A rotator is polymorphic over the base capability set; the two-secret
//! extension and the schema-aware repository hook are orthogonal optional
//! mixins. Decorators probe for the extension through
//! [`Rotator::as_two_secret`] before delegating, so a base that lacks it
//! is detected explicitly rather than discovered by a failed downcast.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dsops_catalog::ServiceCatalog;
use dsops_core::{
    Result, RotationRequest, RotationResult, RotationStatusInfo, SecretInfo, SecretReference,
    VerificationResult, VerificationTest,
};

/// Options for promoting a secondary credential to primary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoteOptions {
    /// How long the old primary stays valid after promotion
    pub grace_period: Duration,

    /// Verify the secondary before promoting (skip when already verified)
    pub verify_first: bool,
}

/// Options for retiring the primary credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeprecateOptions {
    /// How long to keep the credential alive before removal
    pub grace_period: Duration,

    /// Remove immediately and irrecoverably
    pub hard_delete: bool,
}

impl DeprecateOptions {
    /// Immediate, irrecoverable removal. Used for cleanup of an
    /// unverified secondary; implementations should be idempotent so
    /// repeated cleanups are safe.
    pub fn immediate() -> Self {
        Self {
            grace_period: Duration::ZERO,
            hard_delete: true,
        }
    }
}

/// The polymorphic rotation capability.
///
/// On success, `rotate` guarantees `status == completed`, `rotated_at`
/// set, `new_secret_ref` set, and an audit trail containing at least one
/// started and one terminal entry. A dry run must not produce side
/// effects and reports `pending`. Failures are reported in the result
/// (`status == failed`, `error` set); an `Err` return is reserved for
/// infrastructure trouble where no meaningful result exists.
#[async_trait]
pub trait Rotator: Send + Sync {
    /// Stable, registry-unique name
    fn name(&self) -> &str;

    /// Whether this rotator can handle the secret
    fn supports_secret(&self, secret: &SecretInfo) -> bool;

    /// Perform (or simulate) the rotation
    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult>;

    /// Run post-rotation checks against a credential reference
    async fn verify(
        &self,
        secret: &SecretInfo,
        reference: &SecretReference,
        tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>>;

    /// Restore the previous credential
    async fn rollback(&self, secret: &SecretInfo, previous: &SecretReference) -> Result<()>;

    /// Current rotation state of the secret
    async fn get_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo>;

    /// Feature probe for the two-secret extension
    fn as_two_secret(&self) -> Option<&dyn TwoSecretRotator> {
        None
    }

    /// Schema-aware mixin: accept the service-type catalog.
    ///
    /// Rotators that never consult the catalog keep the default no-op;
    /// schema checks are skipped when no repository was provided.
    fn set_repository(&mut self, _catalog: Arc<ServiceCatalog>) {}
}

/// Extension for bases that can hold two live credentials at once.
///
/// Eligible as the base of a two-secret (zero-downtime) strategy.
#[async_trait]
pub trait TwoSecretRotator: Rotator {
    /// Create a secondary credential alongside the current primary
    async fn create_secondary_secret(&self, request: &RotationRequest) -> Result<SecretReference>;

    /// Make the secondary the primary
    async fn promote_secondary_secret(
        &self,
        secret: &SecretInfo,
        secondary: &SecretReference,
        options: &PromoteOptions,
    ) -> Result<()>;

    /// Retire the (old) primary credential
    async fn deprecate_primary_secret(
        &self,
        secret: &SecretInfo,
        options: &DeprecateOptions,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_deprecation_is_hard_and_graceless() {
        let options = DeprecateOptions::immediate();
        assert!(options.hard_delete);
        assert_eq!(options.grace_period, Duration::ZERO);
    }
}
