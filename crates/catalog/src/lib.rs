//! # dsops-catalog: service-type catalog and principal directory
//!
//! An in-memory, read-only mapping from service-type name to its
//! declarative definition: which credential kinds it has, what each kind
//! can do ([`Capability`]), and what constraints apply. The catalog also
//! exposes the principal directory used by policy enforcement and a
//! directory of concrete service instances.
//!
//! Loading the catalog from a repository is an external concern; this
//! crate only defines the in-memory shape and its lookup surface. No I/O
//! happens on the rotation hot path.

#![forbid(unsafe_code)]

mod catalog;
mod principal;
mod service_type;

pub use catalog::{CatalogBuilder, ServiceCatalog, ServiceInstance};
pub use principal::{Permissions, Principal};
pub use service_type::{
    Capability, CredentialKindDef, KindConstraints, MaxActive, ServiceDefaults, ServiceType,
    ServiceTypeMetadata,
};
