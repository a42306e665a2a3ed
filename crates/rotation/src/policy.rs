//! Principal permission checking.
//!
//! A deny is authoritative; constraints are advisory notes the caller may
//! surface. The secret's logical key is used for logging only and always
//! passes through the redaction wrapper.

use std::sync::Arc;

use dsops_catalog::ServiceCatalog;
use dsops_core::parse_duration;
use dsops_log::Secret;
use serde::Serialize;
use tracing::debug;

/// One permission question: may this principal rotate that credential?
#[derive(Debug, Clone)]
pub struct AccessCheck<'a> {
    /// Principal attempting the rotation
    pub principal: &'a str,
    /// Target service type
    pub service_type: &'a str,
    /// Credential kind within the service type
    pub credential_kind: &'a str,
    /// Requested TTL as a duration string, if any
    pub requested_ttl: Option<&'a str>,
    /// Environment the rotation targets
    pub environment: &'a str,
    /// Logical key of the secret (logging only)
    pub secret_key: &'a str,
}

/// Answer to an [`AccessCheck`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionDecision {
    /// Whether the rotation may proceed
    pub allowed: bool,
    /// Why (or why not)
    pub reason: String,
    /// The principal the decision is about, when resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Advisory constraints that apply if the rotation proceeds
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

impl PermissionDecision {
    fn allow(reason: impl Into<String>, principal: Option<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            principal,
            constraints: Vec::new(),
        }
    }

    fn deny(reason: impl Into<String>, principal: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            principal,
            constraints: Vec::new(),
        }
    }
}

/// Permission checker backed by the catalog's principal directory
#[derive(Default)]
pub struct PermissionChecker {
    catalog: Option<Arc<ServiceCatalog>>,
}

impl PermissionChecker {
    /// Checker without a catalog: everything is allowed
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker enforcing the catalog's principals
    pub fn with_catalog(catalog: Arc<ServiceCatalog>) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    /// Evaluate the rules in order; the first deny wins.
    pub fn check(&self, check: &AccessCheck<'_>) -> PermissionDecision {
        debug!(
            principal = check.principal,
            service_type = check.service_type,
            secret = %Secret::new(check.secret_key),
            "checking rotation permission"
        );

        // 1. No catalog: nothing to enforce against.
        let Some(catalog) = &self.catalog else {
            return PermissionDecision::allow("no permission system configured", None);
        };

        // 2. Unknown principals are denied, not silently allowed.
        let Some(principal) = catalog.get_principal(check.principal) else {
            return PermissionDecision::deny(
                format!("Unknown principal: {}", check.principal),
                None,
            );
        };
        let name = Some(principal.name.clone());

        // 3. A principal without a permissions object is unrestricted.
        let Some(permissions) = &principal.permissions else {
            return PermissionDecision::allow("no specific permissions configured", name);
        };

        // 4. Service-type allow-list.
        if !permissions.allowed_services.is_empty()
            && !permissions
                .allowed_services
                .iter()
                .any(|s| s == check.service_type)
        {
            return PermissionDecision::deny(
                format!(
                    "Principal {} is not allowed to rotate {} credentials",
                    principal.name, check.service_type
                ),
                name,
            );
        }

        // 5. Credential-kind allow-list.
        if !permissions.allowed_credential_kinds.is_empty()
            && !permissions
                .allowed_credential_kinds
                .iter()
                .any(|k| k == check.credential_kind)
        {
            return PermissionDecision::deny(
                format!(
                    "Principal {} is not allowed to rotate credential kind {}",
                    principal.name, check.credential_kind
                ),
                name,
            );
        }

        let mut constraints = Vec::new();

        // 6. TTL cap. An unparseable TTL string (on either side) is noted
        // as a constraint rather than failing the check.
        if let Some(max_ttl) = &permissions.max_credential_ttl {
            match parse_duration(max_ttl) {
                Ok(max) => {
                    match check.requested_ttl.map(parse_duration) {
                        Some(Ok(requested)) if requested > max => {
                            return PermissionDecision::deny(
                                format!(
                                    "Requested TTL {} exceeds maximum allowed {}",
                                    check.requested_ttl.unwrap_or_default(),
                                    max_ttl
                                ),
                                name,
                            );
                        }
                        Some(Err(_)) => constraints.push(format!(
                            "requested TTL is unparseable; TTL limited to {max_ttl}"
                        )),
                        _ => constraints.push(format!("TTL limited to {max_ttl}")),
                    }
                }
                Err(_) => constraints.push(format!(
                    "principal's max TTL `{max_ttl}` is unparseable and was not enforced"
                )),
            }
        }

        // 7. Environment scoping: a scalar match passes outright; on a
        // mismatch the metadata environments list may still allow.
        if let Some(scope) = &principal.environment {
            if scope != check.environment
                && !principal.environments().contains(&check.environment)
            {
                return PermissionDecision::deny(
                    format!(
                        "Environment mismatch: principal is scoped to {} but request targets {}",
                        scope, check.environment
                    ),
                    name,
                );
            }
        }

        PermissionDecision {
            allowed: true,
            reason: "allowed".to_string(),
            principal: name,
            constraints,
        }
    }
}
