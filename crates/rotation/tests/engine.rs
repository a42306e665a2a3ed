//! Integration tests for the rotation engine: routing, auto-selection,
//! gating, batch behavior, and persistence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dsops_catalog::{Capability, CredentialKindDef, ServiceCatalog, ServiceType};
use dsops_core::{
    DsopsError, Result, RotationConstraints, RotationRequest, RotationResult, RotationStatus,
    RotationStatusInfo, SecretInfo, SecretKind, SecretReference, VerificationResult,
    VerificationTest,
};
use dsops_history::{HistoryStore, MemoryHistoryStore};
use dsops_rotation::{ImmediateStrategy, RandomRotator, RotationEngine, Rotator, TwoSecretStrategy};

/// A rotator that always returns an infrastructure error.
struct BrokenRotator;

#[async_trait]
impl Rotator for BrokenRotator {
    fn name(&self) -> &str {
        "broken"
    }

    fn supports_secret(&self, _secret: &SecretInfo) -> bool {
        true
    }

    async fn rotate(&self, _request: &RotationRequest) -> Result<RotationResult> {
        Err(DsopsError::Other("backend exploded".to_string()))
    }

    async fn verify(
        &self,
        _secret: &SecretInfo,
        _reference: &SecretReference,
        _tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>> {
        Ok(Vec::new())
    }

    async fn rollback(&self, _secret: &SecretInfo, _previous: &SecretReference) -> Result<()> {
        Ok(())
    }

    async fn get_status(&self, _secret: &SecretInfo) -> Result<RotationStatusInfo> {
        Ok(RotationStatusInfo::unseen())
    }
}

fn secret() -> SecretInfo {
    SecretInfo::new("vault", "db/password", SecretKind::Password)
}

fn engine_with_immediate() -> (RotationEngine, Arc<MemoryHistoryStore>) {
    let history = Arc::new(MemoryHistoryStore::new());
    let engine = RotationEngine::new(history.clone());
    engine
        .register_strategy(Arc::new(ImmediateStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap();
    (engine, history)
}

#[tokio::test]
async fn rotate_prefixes_engine_audit_and_persists() {
    let (engine, history) = engine_with_immediate();
    let request = RotationRequest::new(secret()).with_strategy("immediate-random");

    let result = engine.rotate(&request).await.unwrap();

    assert_eq!(result.status, RotationStatus::Completed);
    assert!(result.rotated_at.is_some());
    assert!(result.new_secret_ref.is_some());
    assert_eq!(result.audit_trail[0].action, "rotation_started");
    assert_eq!(result.audit_trail[0].component, "rotation_engine");

    let persisted = history.get_rotation_history(&secret(), 0).await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0], result);

    let status = history.get_rotation_status(&secret()).await.unwrap();
    assert_eq!(status.status, RotationStatus::Completed);
    assert!(status.last_rotated.is_some());
}

#[tokio::test]
async fn unknown_strategy_fails_with_error() {
    let (engine, _history) = engine_with_immediate();
    let request = RotationRequest::new(secret()).with_strategy("telepathy");

    let result = engine.rotate(&request).await.unwrap();
    assert_eq!(result.status, RotationStatus::Failed);
    assert!(result.error.unwrap().contains("unknown strategy"));
}

#[tokio::test]
async fn explicit_unsupported_strategy_fails_without_error() {
    let history = Arc::new(MemoryHistoryStore::new());
    let engine = RotationEngine::new(history);
    engine
        .register_strategy(Arc::new(TwoSecretStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap();

    // Generic secrets are outside the two-secret kind set.
    let generic = SecretInfo::new("vault", "blob", SecretKind::Generic);
    let request = RotationRequest::new(generic).with_strategy("two-secret-random");

    let result = engine.rotate(&request).await.unwrap();
    assert_eq!(result.status, RotationStatus::Failed);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn auto_selection_prefers_service_default() {
    let catalog = ServiceCatalog::builder()
        .service_type(
            ServiceType::new("postgresql", "database")
                .with_kind(
                    "password",
                    CredentialKindDef::with_capabilities([Capability::Rotate]),
                )
                .with_default_strategy("two-secret-random"),
        )
        .build();

    let history = Arc::new(MemoryHistoryStore::new());
    let engine = RotationEngine::new(history).with_catalog(Arc::new(catalog));
    engine
        .register_strategy(Arc::new(ImmediateStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap();
    engine
        .register_strategy(Arc::new(TwoSecretStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap();

    let request =
        RotationRequest::new(secret().with_metadata("service_type", "postgresql"));
    let result = engine.rotate(&request).await.unwrap();

    assert_eq!(result.status, RotationStatus::Completed);
    assert!(result
        .audit_trail
        .iter()
        .any(|e| e.message.contains("two-secret-random")));
}

#[tokio::test]
async fn auto_selection_falls_back_to_first_supporting() {
    let (engine, _history) = engine_with_immediate();
    let request = RotationRequest::new(secret());
    let result = engine.rotate(&request).await.unwrap();
    assert_eq!(result.status, RotationStatus::Completed);
}

#[tokio::test]
async fn no_supporting_strategy_mentions_does_not_support() {
    let history = Arc::new(MemoryHistoryStore::new());
    let engine = RotationEngine::new(history);
    engine
        .register_strategy(Arc::new(TwoSecretStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap();

    let generic = SecretInfo::new("vault", "blob", SecretKind::Generic);
    let result = engine
        .rotate(&RotationRequest::new(generic))
        .await
        .unwrap();

    assert_eq!(result.status, RotationStatus::Failed);
    assert!(result.error.unwrap().contains("does not support"));
}

#[tokio::test]
async fn strategy_error_becomes_failed_result() {
    let history = Arc::new(MemoryHistoryStore::new());
    let engine = RotationEngine::new(history.clone());
    engine.register_strategy(Arc::new(BrokenRotator)).unwrap();

    let result = engine.rotate(&RotationRequest::new(secret())).await.unwrap();
    assert_eq!(result.status, RotationStatus::Failed);
    assert!(result.error.unwrap().contains("backend exploded"));

    // Failures are persisted too.
    assert_eq!(
        history.get_rotation_history(&secret(), 0).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn duplicate_strategy_registration_is_rejected() {
    let (engine, _history) = engine_with_immediate();
    let err = engine
        .register_strategy(Arc::new(ImmediateStrategy::new(Box::new(
            RandomRotator::new(),
        ))))
        .unwrap_err();
    assert!(err.to_string().contains("already registered"));
}

#[tokio::test]
async fn batch_is_one_to_one_and_survives_failures() {
    let (engine, _history) = engine_with_immediate();

    let ok = RotationRequest::new(secret()).with_strategy("immediate-random");
    let bad = RotationRequest::new(SecretInfo::new("vault", "other", SecretKind::Generic))
        .with_strategy("missing-strategy");
    let results = engine
        .batch_rotate(&[ok.clone(), bad, ok.clone()])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, RotationStatus::Completed);
    assert_eq!(results[1].status, RotationStatus::Failed);
    assert_eq!(results[2].status, RotationStatus::Completed);
    assert_eq!(results[1].secret.key, "other");
}

#[tokio::test]
async fn min_interval_gates_until_forced() {
    let (engine, _history) = engine_with_immediate();
    let constrained = secret().with_constraints(RotationConstraints {
        min_rotation_interval: Some(Duration::from_secs(3600)),
        ..Default::default()
    });

    let first = engine
        .rotate(&RotationRequest::new(constrained.clone()))
        .await
        .unwrap();
    assert_eq!(first.status, RotationStatus::Completed);

    let second = engine
        .rotate(&RotationRequest::new(constrained.clone()))
        .await
        .unwrap();
    assert_eq!(second.status, RotationStatus::Pending);
    assert!(second.error.unwrap().contains("minimum rotation interval"));

    let forced = engine
        .rotate(&RotationRequest::new(constrained).forced())
        .await
        .unwrap();
    assert_eq!(forced.status, RotationStatus::Completed);
}

#[tokio::test]
async fn dry_run_persists_only_a_pending_record() {
    let (engine, history) = engine_with_immediate();
    let request = RotationRequest::new(secret()).dry_run();

    let result = engine.rotate(&request).await.unwrap();
    assert_eq!(result.status, RotationStatus::Pending);
    assert!(result.new_secret_ref.is_none());
    assert!(result.rotated_at.is_none());

    let persisted = history.get_rotation_history(&secret(), 0).await.unwrap();
    assert_eq!(persisted[0].status, RotationStatus::Pending);
}

#[tokio::test]
async fn scheduled_rotations_are_recorded_not_fired() {
    let (engine, history) = engine_with_immediate();
    let when = chrono::Utc::now() + chrono::Duration::hours(6);
    engine.schedule_rotation(RotationRequest::new(secret()), when);
    engine.schedule_rotation(RotationRequest::new(secret()), when); // same key, replaces

    let scheduled = engine.scheduled_rotations();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].not_before, when);

    // Nothing ran.
    assert!(history.get_rotation_history(&secret(), 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_reads_pass_through_limit() {
    let (engine, _history) = engine_with_immediate();
    for _ in 0..4 {
        engine
            .rotate(&RotationRequest::new(secret()).with_strategy("immediate-random"))
            .await
            .unwrap();
    }
    assert_eq!(engine.get_rotation_history(&secret(), 2).await.unwrap().len(), 2);
    assert_eq!(engine.get_rotation_history(&secret(), 0).await.unwrap().len(), 4);

    let status = engine.get_rotation_status(&secret()).await.unwrap();
    assert_eq!(status.status, RotationStatus::Completed);
}
