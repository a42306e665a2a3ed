//! The data-driven service facade.

use std::sync::Arc;

use dsops_catalog::{Capability, ServiceCatalog};
use dsops_core::{RotationStatus, RotationStatusInfo};

use crate::adapter::{AdapterRegistry, ProtocolAdapter, adapter_name_for};
use crate::execute::{PlanOutcome, execute_plan};
use crate::factory::{PlanError, PlanRequest, ServiceFactory};
use crate::plan::{Plan, PlanAction, PlanStep};

/// Rotates catalog-defined services by compiling and executing plans.
///
/// This path never touches a rotator: the service definition is the
/// program, the adapter is the interpreter.
pub struct PlannedService {
    catalog: Arc<ServiceCatalog>,
    factory: ServiceFactory,
    adapters: AdapterRegistry,
}

impl PlannedService {
    /// Service over a catalog with the built-in adapters
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self {
            factory: ServiceFactory::new(catalog.clone()),
            catalog,
            adapters: AdapterRegistry::with_builtins(),
        }
    }

    /// Replace or extend the adapter set
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.register(adapter);
    }

    /// The plan a request would execute, without executing it
    pub fn plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        self.factory.build_plan(request)
    }

    fn adapter_for(&self, request: &PlanRequest) -> Result<Arc<dyn ProtocolAdapter>, PlanError> {
        let service = self
            .catalog
            .get_service_type(&request.service_type)
            .ok_or_else(|| PlanError::UnknownServiceType {
                name: request.service_type.clone(),
            })?;
        let name = adapter_name_for(service);
        self.adapters
            .get(name)
            .ok_or_else(|| PlanError::UnknownAdapter {
                name: name.to_string(),
            })
    }

    /// Compile and execute the full plan
    pub async fn rotate(&self, request: &PlanRequest) -> Result<PlanOutcome, PlanError> {
        let plan = self.factory.build_plan(request)?;
        let adapter = self.adapter_for(request)?;
        Ok(execute_plan(adapter.as_ref(), &plan).await)
    }

    /// Replay only the plan's verify steps through the adapter
    pub async fn verify(&self, request: &PlanRequest) -> Result<PlanOutcome, PlanError> {
        let mut plan = self.factory.build_plan(request)?;
        plan.steps.retain(|s| s.action == PlanAction::Verify);
        let adapter = self.adapter_for(request)?;
        Ok(execute_plan(adapter.as_ref(), &plan).await)
    }

    /// Execute reverse steps, where capabilities allow: re-promote the
    /// previous credential, then revoke the new one if the kind declares
    /// `revoke`.
    pub async fn rollback(&self, request: &PlanRequest) -> Result<PlanOutcome, PlanError> {
        let mut plan = self.factory.build_plan(request)?;
        let service = self
            .catalog
            .get_service_type(&request.service_type)
            .ok_or_else(|| PlanError::UnknownServiceType {
                name: request.service_type.clone(),
            })?;
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
        let mut steps = vec![PlanStep::new(
            "promote_old",
            "restore the previous credential as primary",
            PlanAction::Promote,
            &target,
        )];
        if kind.can(Capability::Revoke) {
            steps.push(PlanStep::new(
                "revoke_new",
                "revoke the rolled-back credential",
                PlanAction::Delete,
                &target,
            ));
        }
        plan.steps = steps;

        let adapter = self.adapter_for(request)?;
        Ok(execute_plan(adapter.as_ref(), &plan).await)
    }

    /// The adapters have no introspection call, so status is unknown and
    /// rotation is never blocked from here.
    pub fn get_status(&self, _request: &PlanRequest) -> RotationStatusInfo {
        RotationStatusInfo {
            status: RotationStatus::Pending,
            last_rotated: None,
            next_rotation: None,
            can_rotate: true,
            reason: "status unknown: adapter has no introspection".to_string(),
        }
    }
}
