//! The catalog itself: pre-populated, immutable during rotation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::principal::Principal;
use crate::service_type::ServiceType;

/// A concrete deployment of a service type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Service-type name this instance belongs to
    pub service_type: String,

    /// Instance identifier (`orders-db-prod`)
    pub id: String,

    /// Environment the instance lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Connection details (host, port, database…)
    #[serde(default)]
    pub connection: HashMap<String, String>,
}

/// In-memory, read-only catalog of service types, principals, and instances.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    service_types: BTreeMap<String, ServiceType>,
    principals: BTreeMap<String, Principal>,
    instances: BTreeMap<(String, String), ServiceInstance>,
}

impl ServiceCatalog {
    /// Start building a catalog
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Look up a service type by name
    pub fn get_service_type(&self, name: &str) -> Option<&ServiceType> {
        self.service_types.get(name)
    }

    /// All service-type names, sorted
    pub fn list_service_types(&self) -> Vec<&str> {
        self.service_types.keys().map(String::as_str).collect()
    }

    /// Look up a principal by name
    pub fn get_principal(&self, name: &str) -> Option<&Principal> {
        self.principals.get(name)
    }

    /// Look up a concrete service instance
    pub fn get_service_instance(&self, service_type: &str, id: &str) -> Option<&ServiceInstance> {
        self.instances
            .get(&(service_type.to_string(), id.to_string()))
    }
}

/// Builder for [`ServiceCatalog`]; consumed by `build`
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    service_types: BTreeMap<String, ServiceType>,
    principals: BTreeMap<String, Principal>,
    instances: BTreeMap<(String, String), ServiceInstance>,
}

impl CatalogBuilder {
    /// Add a service type, keyed by its metadata name
    pub fn service_type(mut self, service: ServiceType) -> Self {
        self.service_types
            .insert(service.metadata.name.clone(), service);
        self
    }

    /// Add a principal, keyed by name
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principals.insert(principal.name.clone(), principal);
        self
    }

    /// Add a service instance
    pub fn instance(mut self, instance: ServiceInstance) -> Self {
        self.instances.insert(
            (instance.service_type.clone(), instance.id.clone()),
            instance,
        );
        self
    }

    /// Freeze into a read-only catalog
    pub fn build(self) -> ServiceCatalog {
        ServiceCatalog {
            service_types: self.service_types,
            principals: self.principals,
            instances: self.instances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_type::{Capability, CredentialKindDef};

    fn catalog() -> ServiceCatalog {
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
            .service_type(ServiceType::new("stripe", "api"))
            .principal(Principal::new("deploy-bot"))
            .instance(ServiceInstance {
                service_type: "postgresql".into(),
                id: "orders-db-prod".into(),
                environment: Some("production".into()),
                connection: HashMap::from([("host".into(), "db.internal".into())]),
            })
            .build()
    }

    #[test]
    fn lookups_hit_and_miss() {
        let catalog = catalog();
        assert!(catalog.get_service_type("postgresql").is_some());
        assert!(catalog.get_service_type("mysql").is_none());
        assert!(catalog.get_principal("deploy-bot").is_some());
        assert!(catalog.get_principal("nobody").is_none());
    }

    #[test]
    fn list_is_sorted() {
        assert_eq!(catalog().list_service_types(), vec!["postgresql", "stripe"]);
    }

    #[test]
    fn instance_lookup_is_keyed_by_type_and_id() {
        let catalog = catalog();
        let instance = catalog
            .get_service_instance("postgresql", "orders-db-prod")
            .unwrap();
        assert_eq!(instance.connection["host"], "db.internal");
        assert!(catalog.get_service_instance("stripe", "orders-db-prod").is_none());
    }
}
