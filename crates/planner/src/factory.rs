//! Compiling a service definition into a plan.

use std::sync::Arc;

use chrono::Utc;
use dsops_catalog::{Capability, ServiceCatalog, ServiceType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::plan::{Plan, PlanAction, PlanStep};

/// What the caller wants rotated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Service-type name
    pub service_type: String,

    /// Credential kind within the service type
    pub credential_kind: String,

    /// Strategy; `None` falls back to the service default, then `immediate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Concrete instance to target; the service name stands in otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Environment the rotation targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl PlanRequest {
    /// Request with defaults
    pub fn new(service_type: impl Into<String>, credential_kind: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            credential_kind: credential_kind.into(),
            strategy: None,
            instance: None,
            environment: None,
        }
    }

    /// Select a strategy by name
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }
}

/// Errors from plan synthesis
#[derive(Debug, Error)]
pub enum PlanError {
    /// The catalog has no such service type
    #[error("unknown service type: {name}")]
    UnknownServiceType {
        /// The name that missed
        name: String,
    },

    /// The service type has no such credential kind
    #[error("unknown credential kind `{kind}` for service type `{service}`")]
    UnknownCredentialKind {
        /// Service type consulted
        service: String,
        /// The kind that missed
        kind: String,
    },

    /// No emission rules for that strategy
    #[error("unknown rotation strategy: {name}")]
    UnknownStrategy {
        /// The strategy that missed
        name: String,
    },

    /// No adapter registered under the selected name
    #[error("no protocol adapter named `{name}`")]
    UnknownAdapter {
        /// The adapter name that missed
        name: String,
    },
}

/// Deterministic fingerprint over the request fields
pub(crate) fn fingerprint(request: &PlanRequest, strategy: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.service_type.as_bytes());
    hasher.update(b"|");
    hasher.update(request.credential_kind.as_bytes());
    hasher.update(b"|");
    hasher.update(strategy.as_bytes());
    hasher.update(b"|");
    hasher.update(request.instance.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(request.environment.as_deref().unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// Synthesizes plans from catalog definitions; never calls a rotator
pub struct ServiceFactory {
    catalog: Arc<ServiceCatalog>,
}

impl ServiceFactory {
    /// Factory over a catalog
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog }
    }

    fn resolve<'a>(
        &'a self,
        request: &PlanRequest,
    ) -> Result<(&'a ServiceType, String), PlanError> {
        let service = self
            .catalog
            .get_service_type(&request.service_type)
            .ok_or_else(|| PlanError::UnknownServiceType {
                name: request.service_type.clone(),
            })?;
        let strategy = request
            .strategy
            .clone()
            .or_else(|| service.defaults.rotation_strategy.clone())
            .unwrap_or_else(|| "immediate".to_string());
        Ok((service, strategy))
    }

    /// Build the ordered plan for a request.
    ///
    /// An unknown credential kind or strategy errors before any step is
    /// emitted.
    pub fn build_plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        let (service, strategy) = self.resolve(request)?;
        let kind = service.kind(&request.credential_kind).ok_or_else(|| {
            PlanError::UnknownCredentialKind {
                service: request.service_type.clone(),
                kind: request.credential_kind.clone(),
            }
        })?;
        let target = request
            .instance
            .clone()
            .unwrap_or_else(|| request.service_type.clone());

        let mut steps = Vec::new();
        match strategy.as_str() {
            "two-key" => {
                if kind.can(Capability::Create) {
                    steps.push(PlanStep::new(
                        "create_new",
                        format!("create a new {} alongside the active one", request.credential_kind),
                        PlanAction::Create,
                        &target,
                    ));
                }
                if kind.can(Capability::Verify) {
                    steps.push(PlanStep::new(
                        "verify_new",
                        "verify the new credential works",
                        PlanAction::Verify,
                        &target,
                    ));
                }
                // Promotion is the point of the pattern; always emitted.
                steps.push(PlanStep::new(
                    "promote_new",
                    "make the new credential the active one",
                    PlanAction::Promote,
                    &target,
                ));
                if kind.can(Capability::Revoke) {
                    steps.push(PlanStep::new(
                        "revoke_old",
                        "revoke the previous credential",
                        PlanAction::Delete,
                        &target,
                    ));
                }
            }
            "immediate" => {
                if kind.can(Capability::Rotate) {
                    steps.push(PlanStep::new(
                        "rotate_immediate",
                        format!("replace the {} in place", request.credential_kind),
                        PlanAction::Create,
                        &target,
                    ));
                }
                if kind.can(Capability::Verify) {
                    steps.push(PlanStep::new(
                        "verify_rotated",
                        "verify the replaced credential works",
                        PlanAction::Verify,
                        &target,
                    ));
                }
            }
            "overlap" => {
                // The previous credential must remain valid through the
                // window: an overlap plan never emits a revoke step.
                steps.push(PlanStep::new(
                    "create_overlapping",
                    "issue a credential valid alongside the current one",
                    PlanAction::Create,
                    &target,
                ));
                steps.push(PlanStep::new(
                    "verify_overlapping",
                    "verify the overlapping credential works",
                    PlanAction::Verify,
                    &target,
                ));
                steps.push(PlanStep::new(
                    "activate_overlapping",
                    "make the overlapping credential primary",
                    PlanAction::Promote,
                    &target,
                ));
            }
            other => {
                return Err(PlanError::UnknownStrategy {
                    name: other.to_string(),
                });
            }
        }

        Ok(Plan {
            fingerprint: fingerprint(request, &strategy),
            created_at: Utc::now(),
            service_type: request.service_type.clone(),
            credential_kind: request.credential_kind.clone(),
            strategy,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsops_catalog::CredentialKindDef;
    use pretty_assertions::assert_eq;

    fn catalog() -> Arc<ServiceCatalog> {
        Arc::new(
            ServiceCatalog::builder()
                .service_type(
                    ServiceType::new("postgresql", "database")
                        .with_kind(
                            "password",
                            CredentialKindDef::with_capabilities([
                                Capability::Create,
                                Capability::Rotate,
                                Capability::Verify,
                                Capability::Revoke,
                            ]),
                        )
                        .with_default_strategy("two-key"),
                )
                .service_type(
                    ServiceType::new("stripe", "api").with_kind(
                        "api_key",
                        CredentialKindDef::with_capabilities([Capability::Rotate]),
                    ),
                )
                .build(),
        )
    }

    #[test]
    fn two_key_plan_emits_four_ordered_steps() {
        let factory = ServiceFactory::new(catalog());
        let request = PlanRequest::new("postgresql", "password").with_strategy("two-key");
        let plan = factory.build_plan(&request).unwrap();

        assert_eq!(plan.steps.len(), 4);
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["create_new", "verify_new", "promote_new", "revoke_old"]);
        let actions: Vec<PlanAction> = plan.steps.iter().map(|s| s.action).collect();
        assert_eq!(
            actions,
            vec![
                PlanAction::Create,
                PlanAction::Verify,
                PlanAction::Promote,
                PlanAction::Delete
            ]
        );
    }

    #[test]
    fn immediate_plan_emits_rotate_then_verify() {
        let factory = ServiceFactory::new(catalog());
        let request = PlanRequest::new("postgresql", "password").with_strategy("immediate");
        let plan = factory.build_plan(&request).unwrap();

        assert_eq!(plan.steps.len(), 2);
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["rotate_immediate", "verify_rotated"]);
        let actions: Vec<PlanAction> = plan.steps.iter().map(|s| s.action).collect();
        assert_eq!(actions, vec![PlanAction::Create, PlanAction::Verify]);
    }

    #[test]
    fn overlap_plan_never_revokes() {
        let factory = ServiceFactory::new(catalog());
        let request = PlanRequest::new("postgresql", "password").with_strategy("overlap");
        let plan = factory.build_plan(&request).unwrap();

        assert_eq!(plan.steps.len(), 3);
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["create_overlapping", "verify_overlapping", "activate_overlapping"]
        );
        assert!(plan.steps.iter().all(|s| s.action != PlanAction::Delete));
    }

    #[test]
    fn strategy_defaults_to_service_then_immediate() {
        let factory = ServiceFactory::new(catalog());

        let defaulted = factory
            .build_plan(&PlanRequest::new("postgresql", "password"))
            .unwrap();
        assert_eq!(defaulted.strategy, "two-key");

        let fallback = factory
            .build_plan(&PlanRequest::new("stripe", "api_key"))
            .unwrap();
        assert_eq!(fallback.strategy, "immediate");
        // Only `rotate` is declared, so the plan has a single step.
        assert_eq!(fallback.steps.len(), 1);
        assert_eq!(fallback.steps[0].name, "rotate_immediate");
    }

    #[test]
    fn capability_gating_drops_steps() {
        let catalog = Arc::new(
            ServiceCatalog::builder()
                .service_type(ServiceType::new("vault-kv", "database").with_kind(
                    "password",
                    CredentialKindDef::with_capabilities([Capability::Create]),
                ))
                .build(),
        );
        let factory = ServiceFactory::new(catalog);
        let plan = factory
            .build_plan(&PlanRequest::new("vault-kv", "password").with_strategy("two-key"))
            .unwrap();

        // No verify, no revoke; promote is always present.
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["create_new", "promote_new"]);
    }

    #[test]
    fn unknown_inputs_error_before_steps() {
        let factory = ServiceFactory::new(catalog());

        assert!(matches!(
            factory.build_plan(&PlanRequest::new("mysql", "password")),
            Err(PlanError::UnknownServiceType { .. })
        ));
        assert!(matches!(
            factory.build_plan(&PlanRequest::new("postgresql", "api_key")),
            Err(PlanError::UnknownCredentialKind { .. })
        ));
        assert!(matches!(
            factory.build_plan(
                &PlanRequest::new("postgresql", "password").with_strategy("chaos")
            ),
            Err(PlanError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn fingerprint_is_deterministic_over_the_request() {
        let factory = ServiceFactory::new(catalog());
        let request = PlanRequest::new("postgresql", "password").with_strategy("two-key");
        let first = factory.build_plan(&request).unwrap();
        let second = factory.build_plan(&request).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);

        let other = factory
            .build_plan(&PlanRequest::new("postgresql", "password").with_strategy("overlap"))
            .unwrap();
        assert_ne!(first.fingerprint, other.fingerprint);
    }
}
