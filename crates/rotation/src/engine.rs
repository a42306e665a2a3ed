//! The rotation engine: routing, audit merging, gating, persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dsops_catalog::ServiceCatalog;
use dsops_core::{
    DsopsError, Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo,
    SecretInfo,
};
use dsops_history::HistoryStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rotator::Rotator;
use crate::strategy::chrono_duration;

const COMPONENT: &str = "rotation_engine";

/// A rotation recorded for an external trigger to fire later.
///
/// The engine never schedules wall-clock time itself: an external
/// scheduler reads these entries and resubmits each request at
/// `not_before`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRotation {
    /// The request to resubmit
    pub request: RotationRequest,

    /// Earliest time to resubmit it
    pub not_before: DateTime<Utc>,

    /// When the entry was recorded
    pub scheduled_at: DateTime<Utc>,
}

enum Selection {
    Chosen(Arc<dyn Rotator>),
    UnknownName(String),
    ExplicitUnsupported(String),
    NoneSupports,
}

/// The orchestrator: owns the table of registered strategies, routes each
/// request, merges audit trails, and persists every outcome before
/// returning it.
pub struct RotationEngine {
    strategies: Mutex<Vec<Arc<dyn Rotator>>>,
    history: Arc<dyn HistoryStore>,
    catalog: Option<Arc<ServiceCatalog>>,
    scheduled: Mutex<BTreeMap<(String, String, i64), ScheduledRotation>>,
}

impl RotationEngine {
    /// Engine persisting through the given history store
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            strategies: Mutex::new(Vec::new()),
            history,
            catalog: None,
            scheduled: Mutex::new(BTreeMap::new()),
        }
    }

    /// Attach the service-type catalog for auto-selection
    pub fn with_catalog(mut self, catalog: Arc<ServiceCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Register a strategy under its own `name()`.
    ///
    /// Names must be unique within the engine.
    pub fn register_strategy(&self, strategy: Arc<dyn Rotator>) -> Result<()> {
        let mut strategies = self.strategies.lock();
        if strategies.iter().any(|s| s.name() == strategy.name()) {
            return Err(DsopsError::configuration(
                "strategy",
                strategy.name(),
                format!("strategy `{}` is already registered", strategy.name()),
            ));
        }
        debug!(strategy = %strategy.name(), "registered strategy");
        strategies.push(strategy);
        Ok(())
    }

    /// Registered strategy names, in registration order
    pub fn strategies(&self) -> Vec<String> {
        self.strategies
            .lock()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    fn select_strategy(&self, request: &RotationRequest) -> Selection {
        let strategies = self.strategies.lock();

        if let Some(name) = &request.strategy {
            let Some(strategy) = strategies.iter().find(|s| s.name() == name.as_str()) else {
                return Selection::UnknownName(name.clone());
            };
            if !strategy.supports_secret(&request.secret) {
                return Selection::ExplicitUnsupported(name.clone());
            }
            return Selection::Chosen(strategy.clone());
        }

        // Auto-selection: the service type's declared default wins, then
        // the first registered strategy that supports the secret.
        if let Some(catalog) = &self.catalog {
            if let Some(service) = request
                .secret
                .meta("service_type")
                .and_then(|name| catalog.get_service_type(name))
            {
                if let Some(default) = &service.defaults.rotation_strategy {
                    if let Some(strategy) = strategies
                        .iter()
                        .find(|s| s.name() == default.as_str() && s.supports_secret(&request.secret))
                    {
                        return Selection::Chosen(strategy.clone());
                    }
                }
            }
        }
        match strategies
            .iter()
            .find(|s| s.supports_secret(&request.secret))
        {
            Some(strategy) => Selection::Chosen(strategy.clone()),
            None => Selection::NoneSupports,
        }
    }

    /// Persist a result and the status derived from it.
    ///
    /// A failed attempt must not erase the last successful rotation stamp,
    /// so the derived status keeps the previous `last_rotated` when the
    /// new result carries none.
    async fn persist(&self, result: &RotationResult) -> Result<()> {
        self.history.record_rotation(result).await?;

        let previous = self.history.get_rotation_status(&result.secret).await?;
        let last_rotated = result.rotated_at.or(previous.last_rotated);
        let min_interval = result
            .secret
            .constraints
            .as_ref()
            .and_then(|c| c.min_rotation_interval);
        let next_rotation =
            last_rotated.zip(min_interval).map(|(last, min)| last + chrono_duration(min));
        let can_rotate = next_rotation.map_or(true, |next| Utc::now() >= next);
        let status = RotationStatusInfo {
            status: result.status,
            last_rotated,
            next_rotation,
            can_rotate,
            reason: if can_rotate {
                String::new()
            } else {
                "minimum rotation interval has not elapsed".to_string()
            },
        };
        self.history
            .save_rotation_status(&result.secret, &status)
            .await
    }

    /// Rotate one secret.
    ///
    /// Never reports a partial success: the returned result is `completed`
    /// only when the selected strategy completed. Every outcome, including
    /// failures, is persisted before returning. `Err` is reserved for
    /// storage trouble.
    pub async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "rotation_started",
            COMPONENT,
            "started",
            format!("rotation requested for `{}`", request.secret.key),
        );

        // Minimum-interval gate, from the persisted status.
        if !request.force {
            if let Some(min) = request
                .secret
                .constraints
                .as_ref()
                .and_then(|c| c.min_rotation_interval)
            {
                let status = self.history.get_rotation_status(&request.secret).await?;
                if let Some(last) = status.last_rotated {
                    if Utc::now() - last < chrono_duration(min) {
                        result.audit(
                            "interval_gate",
                            COMPONENT,
                            "skipped",
                            format!("last rotation at {last} is within the minimum interval"),
                        );
                        result.status = RotationStatus::Pending;
                        result.error = Some(format!(
                            "minimum rotation interval not elapsed: last rotated at {last}; use force to override"
                        ));
                        self.persist(&result).await?;
                        return Ok(result);
                    }
                }
            }
        }

        match self.select_strategy(request) {
            Selection::Chosen(strategy) => {
                result.audit(
                    "strategy_selected",
                    COMPONENT,
                    "completed",
                    format!("using strategy `{}`", strategy.name()),
                );
                match strategy.rotate(request).await {
                    Ok(strategy_result) => result.merge_from(strategy_result),
                    Err(e) => {
                        result.audit("rotation_failed", COMPONENT, "failed", e.to_string());
                        result.fail(e.to_string());
                    }
                }
            }
            Selection::UnknownName(name) => {
                result.audit(
                    "strategy_selection",
                    COMPONENT,
                    "failed",
                    format!("unknown strategy `{name}`"),
                );
                result.fail(format!("unknown strategy `{name}`"));
            }
            Selection::ExplicitUnsupported(name) => {
                // The caller reads `status`; no error message here.
                result.audit(
                    "strategy_selection",
                    COMPONENT,
                    "failed",
                    format!("strategy `{name}` does not support this secret"),
                );
                result.status = RotationStatus::Failed;
            }
            Selection::NoneSupports => {
                let error = DsopsError::Unsupported {
                    rotator: "auto-selection".to_string(),
                    key: request.secret.key.clone(),
                };
                result.audit("strategy_selection", COMPONENT, "failed", error.to_string());
                result.fail(error.to_string());
            }
        }

        self.persist(&result).await?;
        Ok(result)
    }

    /// Rotate a batch, one result per request, preserving order.
    ///
    /// A single failure never fails the batch; storage errors become
    /// failed results too.
    pub async fn batch_rotate(&self, requests: &[RotationRequest]) -> Vec<RotationResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            match self.rotate(request).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    let mut result = RotationResult::new(request.secret.clone());
                    result.audit("rotation_failed", COMPONENT, "failed", e.to_string());
                    result.fail(e.to_string());
                    results.push(result);
                }
            }
        }
        results
    }

    /// Record a rotation for an external trigger to resubmit at `when`.
    ///
    /// Entries are keyed by `(provider, key, when)`; recording the same
    /// triple twice replaces the earlier entry.
    pub fn schedule_rotation(&self, request: RotationRequest, when: DateTime<Utc>) {
        let key = (
            request.secret.provider.clone(),
            request.secret.key.clone(),
            when.timestamp(),
        );
        self.scheduled.lock().insert(
            key,
            ScheduledRotation {
                request,
                not_before: when,
                scheduled_at: Utc::now(),
            },
        );
    }

    /// All pending scheduled entries, ordered by secret then time
    pub fn scheduled_rotations(&self) -> Vec<ScheduledRotation> {
        self.scheduled.lock().values().cloned().collect()
    }

    /// Rotation results for a secret, newest first; `limit == 0` means all
    pub async fn get_rotation_history(
        &self,
        secret: &SecretInfo,
        limit: usize,
    ) -> Result<Vec<RotationResult>> {
        self.history.get_rotation_history(secret, limit).await
    }

    /// Last-known status for a secret
    pub async fn get_rotation_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo> {
        self.history.get_rotation_status(secret).await
    }
}
