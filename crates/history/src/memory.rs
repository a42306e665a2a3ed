//! In-memory history store for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use dsops_core::{Result, RotationResult, RotationStatusInfo, SecretInfo};
use parking_lot::RwLock;

use crate::store::{HistoryStore, MAX_ENTRIES_PER_KEY};

/// History keyed by `"<provider>:<key>"`, capped at
/// [`MAX_ENTRIES_PER_KEY`] entries per secret.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<HashMap<String, Vec<RotationResult>>>,
    statuses: RwLock<HashMap<String, RotationStatusInfo>>,
}

impl MemoryHistoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored results across all secrets
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.read().values().all(Vec::is_empty)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record_rotation(&self, result: &RotationResult) -> Result<()> {
        let key = result.secret.storage_key();
        let mut guard = self.entries.write();
        let log = guard.entry(key).or_default();
        log.push(result.clone());
        if log.len() > MAX_ENTRIES_PER_KEY {
            let overflow = log.len() - MAX_ENTRIES_PER_KEY;
            log.drain(..overflow);
        }
        Ok(())
    }

    async fn get_rotation_history(
        &self,
        secret: &SecretInfo,
        limit: usize,
    ) -> Result<Vec<RotationResult>> {
        let guard = self.entries.read();
        let log = guard.get(&secret.storage_key());
        let mut results: Vec<RotationResult> = log
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default();
        if limit > 0 {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn save_rotation_status(
        &self,
        secret: &SecretInfo,
        status: &RotationStatusInfo,
    ) -> Result<()> {
        self.statuses
            .write()
            .insert(secret.storage_key(), status.clone());
        Ok(())
    }

    async fn get_rotation_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo> {
        Ok(self
            .statuses
            .read()
            .get(&secret.storage_key())
            .cloned()
            .unwrap_or_else(RotationStatusInfo::unseen))
    }
}
