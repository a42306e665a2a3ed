//! # dsops-planner: the data-driven rotation path
//!
//! A separate execution path from the generic rotator engine: a
//! catalog-defined service type is compiled into a [`Plan`], an ordered
//! list of steps, without calling any rotator, and the plan is executed
//! by a [`ProtocolAdapter`] selected by service category. Wire protocols
//! stay inside the adapters; the planner only sequences them.

#![forbid(unsafe_code)]

mod adapter;
mod execute;
mod factory;
mod plan;
mod service;

pub use adapter::{
    AdapterOutput, AdapterRegistry, CertificateAdapter, HttpApiAdapter, NoSqlAdapter,
    ProtocolAdapter, SqlAdapter, adapter_name_for,
};
pub use execute::{ExecutedStep, PlanOutcome, execute_plan};
pub use factory::{PlanError, PlanRequest, ServiceFactory};
pub use plan::{Plan, PlanAction, PlanStep};
pub use service::PlannedService;
