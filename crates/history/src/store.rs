//! The storage contract.

use async_trait::async_trait;
use dsops_core::{Result, RotationResult, RotationStatusInfo, SecretInfo};

/// In-memory retention cap per secret
pub const MAX_ENTRIES_PER_KEY: usize = 100;

/// Durable history keyed by `(provider, key)`.
///
/// Reads are consistent with the last completed write for the same key;
/// ordering across different secrets is not defined.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a rotation result to the secret's log
    async fn record_rotation(&self, result: &RotationResult) -> Result<()>;

    /// Results for the secret, newest first. `limit == 0` returns all.
    async fn get_rotation_history(
        &self,
        secret: &SecretInfo,
        limit: usize,
    ) -> Result<Vec<RotationResult>>;

    /// Overwrite the last-known status for the secret
    async fn save_rotation_status(
        &self,
        secret: &SecretInfo,
        status: &RotationStatusInfo,
    ) -> Result<()>;

    /// Last-known status; a secret never seen before yields
    /// `{pending, can_rotate: true, "No rotation history found"}`
    async fn get_rotation_status(&self, secret: &SecretInfo) -> Result<RotationStatusInfo>;
}

/// Replace filesystem-hostile characters in a name component.
///
/// `/ \ : * ? " < > |` and spaces all become `_`.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            other => other,
        })
        .collect()
}
