//! Minimal contract for the provider-backed secret store.
//!
//! The store itself is an external collaborator; rotators only consume
//! this read/write surface. The in-memory implementation backs tests and
//! the generic rotator.

use std::collections::HashMap;

use async_trait::async_trait;
use dsops_log::Secret;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{DsopsError, Result};
use crate::secret::{SecretInfo, SecretReference};

/// Read/write surface of a secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the value a reference points at
    async fn get(&self, reference: &SecretReference) -> Result<Secret>;

    /// Write a new value for the secret, returning a reference to it
    async fn put(&self, secret: &SecretInfo, value: &Secret) -> Result<SecretReference>;
}

/// In-memory store keyed by `"<provider>:<key>"`
#[derive(Default)]
pub struct MemorySecretStore {
    values: RwLock<HashMap<String, (String, u64)>>,
}

impl MemorySecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, reference: &SecretReference) -> Result<Secret> {
        let key = format!("{}:{}", reference.provider, reference.key);
        self.values
            .read()
            .get(&key)
            .map(|(value, _)| Secret::new(value.clone()))
            .ok_or_else(|| DsopsError::Storage(format!("secret not found: {key}")))
    }

    async fn put(&self, secret: &SecretInfo, value: &Secret) -> Result<SecretReference> {
        let key = secret.storage_key();
        let mut guard = self.values.write();
        let version = guard.get(&key).map(|(_, v)| v + 1).unwrap_or(1);
        guard.insert(key, (value.expose().to_string(), version));
        Ok(SecretReference::for_secret(secret)
            .with_version(format!("v{version}"))
            .with_id(Uuid::new_v4().to_string()))
    }
}
