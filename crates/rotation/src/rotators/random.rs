//! Generic rotator producing random alphanumeric material.
//!
//! Intended for tests and generic secrets: it supports everything, cannot
//! roll back (the old value is irrecoverable by definition), and writes
//! through the secret store only when one is attached.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dsops_core::{
    Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo, SecretInfo,
    SecretReference, SecretStore, VerificationResult, VerificationTest,
};
use dsops_log::Secret;
use rand::Rng;
use rand::distr::Alphanumeric;
use uuid::Uuid;

use crate::rotator::Rotator;

/// Default length of generated material
pub const DEFAULT_LENGTH: usize = 32;

const COMPONENT: &str = "random_rotator";

/// Cryptographically strong alphanumeric generation
#[derive(Default)]
pub struct RandomRotator {
    store: Option<Arc<dyn SecretStore>>,
}

impl RandomRotator {
    /// Rotator without a backing store; references are synthesized
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotator writing generated values through a secret store
    pub fn with_store(store: Arc<dyn SecretStore>) -> Self {
        Self { store: Some(store) }
    }

    fn material_for(request: &RotationRequest) -> (Secret, usize) {
        if let Some(spec) = &request.new_value {
            if let Some(literal) = &spec.literal {
                return (Secret::new(literal.clone()), literal.len());
            }
            if let Some(length) = spec.length {
                return (generate(length), length);
            }
        }
        (generate(DEFAULT_LENGTH), DEFAULT_LENGTH)
    }
}

/// Generate `length` random alphanumeric characters
fn generate(length: usize) -> Secret {
    let value: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    Secret::new(value)
}

#[async_trait]
impl Rotator for RandomRotator {
    fn name(&self) -> &str {
        "random"
    }

    fn supports_secret(&self, _secret: &SecretInfo) -> bool {
        true
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "rotation_started",
            COMPONENT,
            "started",
            format!("rotating `{}`", request.secret.key),
        );

        if request.dry_run {
            result.audit(
                "dry_run",
                COMPONENT,
                "completed",
                "simulated rotation; no value was generated or stored",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        let (value, length) = Self::material_for(request);
        result.audit(
            "value_generated",
            COMPONENT,
            "completed",
            format!("generated {length} characters of material"),
        );

        let reference = match &self.store {
            Some(store) => match store.put(&request.secret, &value).await {
                Ok(reference) => reference,
                Err(e) => {
                    result.audit("store_write", COMPONENT, "failed", e.to_string());
                    result.fail(format!("failed to store new value: {e}"));
                    return Ok(result);
                }
            },
            None => SecretReference::for_secret(&request.secret)
                .with_version(Utc::now().timestamp().to_string())
                .with_id(Uuid::new_v4().to_string())
                .with_metadata("length", length.to_string()),
        };

        result.complete(reference);
        result.audit("rotation_completed", COMPONENT, "completed", "new value active");
        Ok(result)
    }

    async fn verify(
        &self,
        _secret: &SecretInfo,
        _reference: &SecretReference,
        tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>> {
        // Generated values have no live service to exercise.
        Ok(tests
            .iter()
            .map(|test| VerificationResult::pass(test, "no target service; value is present"))
            .collect())
    }

    async fn rollback(&self, _secret: &SecretInfo, _previous: &SecretReference) -> Result<()> {
        // The replaced value is irrecoverable; rollback is a no-op.
        Ok(())
    }

    async fn get_status(&self, _secret: &SecretInfo) -> Result<RotationStatusInfo> {
        Ok(RotationStatusInfo {
            status: RotationStatus::Pending,
            last_rotated: None,
            next_rotation: None,
            can_rotate: true,
            reason: "random material can be regenerated at any time".to_string(),
        })
    }
}
