//! Protocol adapters and their selection.
//!
//! An adapter executes one plan step against a target service. Selection
//! is by service category, with a name heuristic splitting SQL from
//! NoSQL databases. The built-in adapters synthesize credential material
//! (passwords, key ids, certificate serials); service-specific wire
//! protocols belong in out-of-tree adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dsops_catalog::ServiceType;
use dsops_core::{DsopsError, Result};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::debug;

use crate::plan::{Plan, PlanAction, PlanStep};

/// What an adapter produced for one step
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    /// Human-readable outcome
    pub message: String,

    /// Key/value output; `value` and `serial_number` propagate into the
    /// plan outcome when the step is a `create`
    pub metadata: HashMap<String, String>,
}

impl AdapterOutput {
    /// Output with just a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A protocol-specific executor for plan steps
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Adapter name, the selection key
    fn name(&self) -> &str;

    /// Execute one step of a plan
    async fn execute(&self, plan: &Plan, step: &PlanStep) -> Result<AdapterOutput>;
}

/// Adapter name for a service type.
///
/// `database` services use `sql` unless the type name says otherwise;
/// API-ish categories use `http-api`; certificate stores use
/// `certificate`; everything else falls back to `http-api`.
pub fn adapter_name_for(service: &ServiceType) -> &'static str {
    let name = service.metadata.name.to_ascii_lowercase();
    match service.metadata.category.as_str() {
        "database" => {
            if ["mongo", "redis", "dynamo"].iter().any(|n| name.contains(n)) {
                "nosql"
            } else {
                "sql"
            }
        }
        "api" | "api-service" => "http-api",
        "certificate" | "certificates" => "certificate",
        _ => "http-api",
    }
}

fn alphanumeric(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Relational databases: user/password management over SQL
#[derive(Default)]
pub struct SqlAdapter;

#[async_trait]
impl ProtocolAdapter for SqlAdapter {
    fn name(&self) -> &str {
        "sql"
    }

    async fn execute(&self, plan: &Plan, step: &PlanStep) -> Result<AdapterOutput> {
        debug!(step = %step.name, target = %step.target, "sql adapter executing");
        Ok(match step.action {
            PlanAction::Create => AdapterOutput::message(format!(
                "provisioned {} credential on {}",
                plan.credential_kind, step.target
            ))
            .with_metadata("value", alphanumeric(24)),
            PlanAction::Verify => {
                AdapterOutput::message(format!("connected to {} with new credential", step.target))
            }
            PlanAction::Promote => {
                AdapterOutput::message(format!("new credential active on {}", step.target))
            }
            PlanAction::Delete => {
                AdapterOutput::message(format!("old credential dropped on {}", step.target))
            }
        })
    }
}

/// Document and key/value stores
#[derive(Default)]
pub struct NoSqlAdapter;

#[async_trait]
impl ProtocolAdapter for NoSqlAdapter {
    fn name(&self) -> &str {
        "nosql"
    }

    async fn execute(&self, plan: &Plan, step: &PlanStep) -> Result<AdapterOutput> {
        debug!(step = %step.name, target = %step.target, "nosql adapter executing");
        Ok(match step.action {
            PlanAction::Create => AdapterOutput::message(format!(
                "provisioned {} credential on {}",
                plan.credential_kind, step.target
            ))
            .with_metadata("value", alphanumeric(32)),
            PlanAction::Verify => {
                AdapterOutput::message(format!("pinged {} with new credential", step.target))
            }
            PlanAction::Promote => {
                AdapterOutput::message(format!("new credential active on {}", step.target))
            }
            PlanAction::Delete => {
                AdapterOutput::message(format!("old credential removed on {}", step.target))
            }
        })
    }
}

/// HTTP API services: key issuance over a management API
#[derive(Default)]
pub struct HttpApiAdapter;

#[async_trait]
impl ProtocolAdapter for HttpApiAdapter {
    fn name(&self) -> &str {
        "http-api"
    }

    async fn execute(&self, plan: &Plan, step: &PlanStep) -> Result<AdapterOutput> {
        debug!(step = %step.name, target = %step.target, "http-api adapter executing");
        Ok(match step.action {
            PlanAction::Create => AdapterOutput::message(format!(
                "issued {} on {}",
                plan.credential_kind, step.target
            ))
            .with_metadata("value", format!("key_{}", alphanumeric(40))),
            PlanAction::Verify => {
                AdapterOutput::message(format!("authenticated against {}", step.target))
            }
            PlanAction::Promote => {
                AdapterOutput::message(format!("new key is primary on {}", step.target))
            }
            PlanAction::Delete => {
                AdapterOutput::message(format!("old key revoked on {}", step.target))
            }
        })
    }
}

/// Certificate authorities and stores
#[derive(Default)]
pub struct CertificateAdapter;

#[async_trait]
impl ProtocolAdapter for CertificateAdapter {
    fn name(&self) -> &str {
        "certificate"
    }

    async fn execute(&self, plan: &Plan, step: &PlanStep) -> Result<AdapterOutput> {
        debug!(step = %step.name, target = %step.target, "certificate adapter executing");
        Ok(match step.action {
            PlanAction::Create => {
                let serial: u128 = rand::rng().random();
                AdapterOutput::message(format!(
                    "issued {} for {}",
                    plan.credential_kind, step.target
                ))
                .with_metadata("serial_number", format!("{serial:032X}"))
                .with_metadata("value", alphanumeric(48))
            }
            PlanAction::Verify => {
                AdapterOutput::message(format!("chain validated for {}", step.target))
            }
            PlanAction::Promote => {
                AdapterOutput::message(format!("certificate deployed to {}", step.target))
            }
            PlanAction::Delete => {
                return Err(DsopsError::Adapter(
                    "certificate adapter does not revoke; overlapping certificates expire"
                        .to_string(),
                ));
            }
        })
    }
}

/// Registry of adapters by name
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    /// Registry with the four built-in adapters
    pub fn with_builtins() -> Self {
        let mut adapters: HashMap<String, Arc<dyn ProtocolAdapter>> = HashMap::new();
        for adapter in [
            Arc::new(SqlAdapter) as Arc<dyn ProtocolAdapter>,
            Arc::new(NoSqlAdapter),
            Arc::new(HttpApiAdapter),
            Arc::new(CertificateAdapter),
        ] {
            adapters.insert(adapter.name().to_string(), adapter);
        }
        Self { adapters }
    }

    /// Register (or replace) an adapter
    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Look up an adapter by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(name).cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, category: &str) -> ServiceType {
        ServiceType::new(name, category)
    }

    #[test]
    fn database_selection_splits_sql_from_nosql() {
        assert_eq!(adapter_name_for(&service("postgresql", "database")), "sql");
        assert_eq!(adapter_name_for(&service("mysql", "database")), "sql");
        assert_eq!(adapter_name_for(&service("mongodb", "database")), "nosql");
        assert_eq!(adapter_name_for(&service("redis-cache", "database")), "nosql");
        assert_eq!(adapter_name_for(&service("dynamodb", "database")), "nosql");
    }

    #[test]
    fn api_and_certificate_categories() {
        assert_eq!(adapter_name_for(&service("stripe", "api")), "http-api");
        assert_eq!(adapter_name_for(&service("github", "api-service")), "http-api");
        assert_eq!(adapter_name_for(&service("internal-ca", "certificate")), "certificate");
        assert_eq!(adapter_name_for(&service("acme", "certificates")), "certificate");
        assert_eq!(adapter_name_for(&service("mystery", "queue")), "http-api");
    }

    #[test]
    fn builtins_cover_all_selection_outcomes() {
        let registry = AdapterRegistry::with_builtins();
        for name in ["sql", "nosql", "http-api", "certificate"] {
            assert!(registry.get(name).is_some(), "missing adapter {name}");
        }
        assert!(registry.get("grpc").is_none());
    }
}
