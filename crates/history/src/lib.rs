//! # dsops-history: rotation history and status storage
//!
//! Durable storage keyed by secret identity (`provider`, `key`): an
//! append-only log of [`RotationResult`]s plus the last-known
//! [`RotationStatusInfo`] per secret.
//!
//! Two implementations of [`HistoryStore`]: [`MemoryHistoryStore`] for
//! tests and embedded use, and [`FsHistoryStore`] persisting pretty-printed
//! JSON under `<base>/history/` and `<base>/status/`.
//!
//! [`RotationResult`]: dsops_core::RotationResult
//! [`RotationStatusInfo`]: dsops_core::RotationStatusInfo

#![forbid(unsafe_code)]

mod fs;
mod memory;
mod store;

pub use fs::FsHistoryStore;
pub use memory::MemoryHistoryStore;
pub use store::{HistoryStore, MAX_ENTRIES_PER_KEY, sanitize_component};
