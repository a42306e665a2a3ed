//! # dsops-rotation: rotators, strategies, and the engine
//!
//! The rotation pipeline, bottom-up:
//!
//! - [`Rotator`] is the polymorphic capability every rotation component
//!   implements, with the optional [`TwoSecretRotator`] extension for
//!   zero-downtime bases and a schema-aware `set_repository` hook.
//! - Base rotators perform the actual side effect: [`RandomRotator`]
//!   (generated alphanumerics), [`WebhookRotator`] (HTTP delegation) and
//!   [`ScriptRotator`] (local executable over stdin/stdout JSON).
//! - Strategy decorators compose a rotation pattern over any base:
//!   [`ImmediateStrategy`], [`TwoSecretStrategy`], [`OverlapStrategy`].
//! - The [`StrategyRegistry`] maps names to rotator factories; the
//!   [`RotationEngine`] routes requests, merges audit trails, and persists
//!   every outcome through a history store.
//! - [`PermissionChecker`] and [`CredentialValidator`] are the two policy
//!   enforcement points.

#![forbid(unsafe_code)]

pub mod engine;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod rotator;
pub mod rotators;
pub mod strategy;
pub mod validation;

pub use engine::{RotationEngine, ScheduledRotation};
pub use policy::{AccessCheck, PermissionChecker, PermissionDecision};
pub use protocol::{ProtocolRequest, ProtocolResponse, SchemaMetadata};
pub use registry::{RotatorFactory, StrategyRegistry};
pub use rotator::{DeprecateOptions, PromoteOptions, Rotator, TwoSecretRotator};
pub use rotators::{RandomRotator, ScriptRotator, WebhookRotator};
pub use strategy::{ImmediateStrategy, OverlapStrategy, TwoSecretStrategy};
pub use validation::{CredentialValidator, ValidationReport, mask_value};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::engine::RotationEngine;
    pub use crate::policy::{AccessCheck, PermissionChecker, PermissionDecision};
    pub use crate::registry::StrategyRegistry;
    pub use crate::rotator::{DeprecateOptions, PromoteOptions, Rotator, TwoSecretRotator};
    pub use crate::rotators::{RandomRotator, ScriptRotator, WebhookRotator};
    pub use crate::strategy::{ImmediateStrategy, OverlapStrategy, TwoSecretStrategy};
    pub use crate::validation::{CredentialValidator, ValidationReport};
    pub use dsops_core::prelude::*;
}
