//! # dsops-incident: incident records and notification
//!
//! Durable security-event records with `INC-YYYYMMDD-NNNNN` identifiers,
//! forward-only status transitions (`open → investigating → resolved`),
//! and a best-effort notifier that pushes each report to a chat webhook
//! and an issue tracker without ever blocking the report itself.
//!
//! Persistence is one JSON file per report under
//! `<base>/.dsops/incidents/` plus an append-only `audit.log` alongside.

#![forbid(unsafe_code)]

mod manager;
mod notify;
mod report;

pub use manager::{IncidentError, IncidentManager, Result};
pub use notify::{ChatChannelConfig, IssueChannelConfig, Notifier, NotifierConfig};
pub use report::{
    IncidentReport, IncidentSeverity, IncidentStatus, NotificationRecord, is_valid_incident_id,
};
