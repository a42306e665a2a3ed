//! Filesystem-backed history store.
//!
//! Layout, relative to the chosen base directory:
//!
//! ```text
//! <base>/history/<sanitized_key>_<unix_seconds>.json   one object per attempt
//! <base>/status/<sanitized_key>_<sanitized_provider>.json   overwritten
//! ```
//!
//! Results are pretty-printed JSON wrapped with a storage id and a
//! `stored_at` stamp. Reads re-filter on exact `key` and `provider` after
//! deserialization, since sanitized file names can collide across secrets.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dsops_core::{DsopsError, Result, RotationResult, RotationStatusInfo, SecretInfo};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::store::{HistoryStore, sanitize_component};

/// On-disk wrapper around one rotation attempt
#[derive(Debug, Serialize, Deserialize)]
struct StoredRotation {
    /// `"<provider>_<sanitized_key>_<unix>"`
    id: String,

    /// When the record was written
    stored_at: DateTime<Utc>,

    #[serde(flatten)]
    result: RotationResult,
}

/// Rotation history persisted as JSON files.
///
/// One readers-writer lock guards the whole store: writes are exclusive,
/// reads run concurrently, and sorting happens in-process on read.
pub struct FsHistoryStore {
    history_dir: PathBuf,
    status_dir: PathBuf,
    lock: RwLock<()>,
}

impl FsHistoryStore {
    /// Open (creating directories as needed) a store under `base`
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let history_dir = base.join("history");
        let status_dir = base.join("status");
        fs::create_dir_all(&history_dir)?;
        fs::create_dir_all(&status_dir)?;
        Ok(Self {
            history_dir,
            status_dir,
            lock: RwLock::new(()),
        })
    }

    fn history_path(&self, secret: &SecretInfo, unix: i64) -> PathBuf {
        let stem = format!("{}_{}", sanitize_component(&secret.key), unix);
        let candidate = self.history_dir.join(format!("{stem}.json"));
        if !candidate.exists() {
            return candidate;
        }
        // Two results in the same second: disambiguate rather than overwrite.
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        self.history_dir.join(format!("{stem}_{suffix}.json"))
    }

    fn status_path(&self, secret: &SecretInfo) -> PathBuf {
        self.status_dir.join(format!(
            "{}_{}.json",
            sanitize_component(&secret.key),
            sanitize_component(&secret.provider)
        ))
    }
}

#[async_trait]
impl HistoryStore for FsHistoryStore {
    async fn record_rotation(&self, result: &RotationResult) -> Result<()> {
        let _guard = self.lock.write();
        let now = Utc::now();
        let unix = now.timestamp();
        let record = StoredRotation {
            id: format!(
                "{}_{}_{}",
                result.secret.provider,
                sanitize_component(&result.secret.key),
                unix
            ),
            stored_at: now,
            result: result.clone(),
        };
        let path = self.history_path(&result.secret, unix);
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json)
            .map_err(|e| DsopsError::Storage(format!("write {}: {e}", path.display())))
    }

    async fn get_rotation_history(
        &self,
        secret: &SecretInfo,
        limit: usize,
    ) -> Result<Vec<RotationResult>> {
        let _guard = self.lock.read();
        let mut matches: Vec<(DateTime<Utc>, String, RotationResult)> = Vec::new();
        for entry in fs::read_dir(&self.history_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable history file");
                    continue;
                }
            };
            let stored: StoredRotation = match serde_json::from_str(&text) {
                Ok(stored) => stored,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping malformed history file");
                    continue;
                }
            };
            if stored.result.secret.key == secret.key
                && stored.result.secret.provider == secret.provider
            {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                matches.push((stored.stored_at, name, stored.result));
            }
        }

        // Newest first; file-name descending breaks same-instant ties.
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        let mut results: Vec<RotationResult> = matches.into_iter().map(|(_, _, r)| r).collect();
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
        let _guard = self.lock.write();
        let path = self.status_path(secret);
        let json = serde_json::to_string_pretty(status)?;
        fs::write(&path, json)
            .map_err(|e| DsopsError::Storage(format!("write {}: {e}", path.display())))
    }

    async fn get_rotation_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo> {
        let _guard = self.lock.read();
        let path = self.status_path(secret);
        if !path.exists() {
            return Ok(RotationStatusInfo::unseen());
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsops_core::{RotationStatus, SecretKind, SecretReference};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn secret() -> SecretInfo {
        SecretInfo::new("vault", "db/password", SecretKind::Password)
    }

    fn completed_result(marker: &str) -> RotationResult {
        let mut result = RotationResult::new(secret());
        result.audit("rotation_started", "rotation_engine", "started", "go");
        result.complete(SecretReference::for_secret(&secret()).with_version(marker));
        result
    }

    #[tokio::test]
    async fn record_and_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();
        let written = completed_result("v1");
        store.record_rotation(&written).await.unwrap();

        let history = store.get_rotation_history(&secret(), 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], written);
    }

    #[tokio::test]
    async fn file_names_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();
        store.record_rotation(&completed_result("v1")).await.unwrap();

        let names: Vec<String> = fs::read_dir(dir.path().join("history"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("db_password_"));
        assert!(!names[0].contains('/'));
    }

    #[tokio::test]
    async fn same_second_writes_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();
        store.record_rotation(&completed_result("v1")).await.unwrap();
        store.record_rotation(&completed_result("v2")).await.unwrap();
        store.record_rotation(&completed_result("v3")).await.unwrap();

        let history = store.get_rotation_history(&secret(), 0).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn reads_filter_on_exact_key_and_provider() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();
        store.record_rotation(&completed_result("v1")).await.unwrap();

        // Same sanitized form, different real key.
        let cousin = SecretInfo::new("vault", "db password", SecretKind::Password);
        let mut cousin_result = RotationResult::new(cousin.clone());
        cousin_result.complete(SecretReference::for_secret(&cousin));
        store.record_rotation(&cousin_result).await.unwrap();

        let history = store.get_rotation_history(&secret(), 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].secret.key, "db/password");
    }

    #[tokio::test]
    async fn malformed_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();
        store.record_rotation(&completed_result("v1")).await.unwrap();
        fs::write(dir.path().join("history/garbage.json"), "not json").unwrap();
        fs::write(dir.path().join("history/notes.txt"), "ignored").unwrap();

        let history = store.get_rotation_history(&secret(), 0).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn status_round_trip_and_unseen_default() {
        let dir = TempDir::new().unwrap();
        let store = FsHistoryStore::open(dir.path()).unwrap();

        let unseen = store.get_rotation_status(&secret()).await.unwrap();
        assert!(unseen.can_rotate);
        assert_eq!(unseen.reason, "No rotation history found");

        let mut status = RotationStatusInfo::unseen();
        status.status = RotationStatus::Completed;
        store.save_rotation_status(&secret(), &status).await.unwrap();

        let loaded = store.get_rotation_status(&secret()).await.unwrap();
        assert_eq!(loaded.status, RotationStatus::Completed);

        let names: Vec<String> = fs::read_dir(dir.path().join("status"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["db_password_vault.json".to_string()]);
    }
}
