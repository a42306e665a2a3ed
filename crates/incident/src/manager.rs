//! Incident persistence and lifecycle management.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::report::{IncidentReport, IncidentStatus, NotificationRecord, is_valid_incident_id};

/// Result type for incident operations
pub type Result<T> = std::result::Result<T, IncidentError>;

/// Errors from the incident subsystem
#[derive(Debug, Error)]
pub enum IncidentError {
    /// No report with that id
    #[error("incident not found: {id}")]
    NotFound {
        /// The id that missed
        id: String,
    },

    /// The id does not match `INC-YYYYMMDD-NNNNN`
    #[error("invalid incident id: {id}")]
    InvalidId {
        /// The rejected id
        id: String,
    },

    /// A backward or repeated status transition
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: IncidentStatus,
        /// Requested status
        to: IncidentStatus,
    },

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Owns the `<base>/.dsops/incidents/` directory: one JSON file per
/// report plus an append-only `audit.log` of every operation.
pub struct IncidentManager {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl IncidentManager {
    /// Open (creating as needed) the incident directory under `base`
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let dir = base.as_ref().join(".dsops").join("incidents");
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn report_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn append_audit(&self, action: &str, id: &str, detail: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("audit.log"))?;
        writeln!(
            file,
            "{} {action} {id} {detail}",
            Utc::now().to_rfc3339()
        )?;
        Ok(())
    }

    fn write_report(&self, report: &IncidentReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        fs::write(self.report_path(&report.id), json)?;
        Ok(())
    }

    /// Next id for today: `INC-YYYYMMDD-NNNNN` with a per-day sequence
    fn next_id(&self) -> String {
        let date = Utc::now().format("%Y%m%d").to_string();
        let prefix = format!("INC-{date}-");
        let max_seen = self
            .read_reports()
            .iter()
            .filter_map(|r| r.id.strip_prefix(&prefix))
            .filter_map(|seq| seq.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{prefix}{:05}", max_seen + 1)
    }

    fn read_reports(&self) -> Vec<IncidentReport> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut reports = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(text) = fs::read_to_string(&path) else {
                debug!(path = %path.display(), "skipping unreadable incident file");
                continue;
            };
            match serde_json::from_str::<IncidentReport>(&text) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping malformed incident file");
                }
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports
    }

    /// Persist a new report, assigning an id when the draft has none
    pub fn create_report(&self, mut report: IncidentReport) -> Result<IncidentReport> {
        let _guard = self.lock.lock();
        if report.id.is_empty() {
            report.id = self.next_id();
        } else if !is_valid_incident_id(&report.id) {
            return Err(IncidentError::InvalidId {
                id: report.id.clone(),
            });
        }
        self.write_report(&report)?;
        self.append_audit("created", &report.id, &report.title)?;
        Ok(report)
    }

    /// Load a report by id
    pub fn get_report(&self, id: &str) -> Result<IncidentReport> {
        let _guard = self.lock.lock();
        let path = self.report_path(id);
        if !path.exists() {
            return Err(IncidentError::NotFound { id: id.to_string() });
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// All reports, newest first. Malformed files are skipped.
    pub fn list_reports(&self) -> Vec<IncidentReport> {
        let _guard = self.lock.lock();
        self.read_reports()
    }

    /// Reports in a given status
    pub fn list_by_status(&self, status: IncidentStatus) -> Vec<IncidentReport> {
        self.list_reports()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Reports of a given type
    pub fn list_by_type(&self, incident_type: &str) -> Vec<IncidentReport> {
        self.list_reports()
            .into_iter()
            .filter(|r| r.incident_type == incident_type)
            .collect()
    }

    /// Advance a report's status. Only the transition into `resolved`
    /// sets `resolved_at`.
    pub fn update_status(
        &self,
        id: &str,
        status: IncidentStatus,
        notes: Option<String>,
    ) -> Result<IncidentReport> {
        let mut report = self.get_report(id)?;
        let _guard = self.lock.lock();
        if !report.status.can_transition_to(status) {
            return Err(IncidentError::InvalidTransition {
                from: report.status,
                to: status,
            });
        }
        let from = report.status;
        report.status = status;
        if status == IncidentStatus::Resolved {
            report.resolved_at = Some(Utc::now());
        }
        if let Some(notes) = notes {
            report.notes = Some(notes);
        }
        self.write_report(&report)?;
        self.append_audit("status", id, &format!("{from} -> {status}"))?;
        Ok(report)
    }

    /// Append a notification delivery record and persist
    pub fn add_notification(
        &self,
        id: &str,
        record: NotificationRecord,
    ) -> Result<IncidentReport> {
        let mut report = self.get_report(id)?;
        let _guard = self.lock.lock();
        let detail = format!(
            "{} {}",
            record.channel,
            if record.success { "delivered" } else { "failed" }
        );
        report.notifications.push(record);
        self.write_report(&report)?;
        self.append_audit("notified", id, &detail)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IncidentSeverity;
    use tempfile::TempDir;

    fn draft(title: &str) -> IncidentReport {
        IncidentReport::new(
            "exposed_secret",
            IncidentSeverity::High,
            title,
            "A live key was committed.",
        )
    }

    #[test]
    fn create_assigns_sequential_daily_ids() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();

        let first = manager.create_report(draft("one")).unwrap();
        let second = manager.create_report(draft("two")).unwrap();

        assert!(is_valid_incident_id(&first.id));
        assert!(is_valid_incident_id(&second.id));
        assert!(first.id.ends_with("-00001"));
        assert!(second.id.ends_with("-00002"));
        assert!(dir
            .path()
            .join(".dsops/incidents")
            .join(format!("{}.json", first.id))
            .exists());
    }

    #[test]
    fn explicit_malformed_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        let mut report = draft("bad id");
        report.id = "INCIDENT-1".to_string();
        assert!(matches!(
            manager.create_report(report),
            Err(IncidentError::InvalidId { .. })
        ));
    }

    #[test]
    fn get_round_trips_and_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        let created = manager.create_report(draft("round trip")).unwrap();

        let loaded = manager.get_report(&created.id).unwrap();
        assert_eq!(loaded, created);

        assert!(matches!(
            manager.get_report("INC-20260101-99999"),
            Err(IncidentError::NotFound { .. })
        ));
    }

    #[test]
    fn listing_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        manager.create_report(draft("valid")).unwrap();
        fs::write(
            dir.path().join(".dsops/incidents/INC-20260101-00009.json"),
            "{ not json",
        )
        .unwrap();

        let reports = manager.list_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, "valid");
    }

    #[test]
    fn queries_by_status_and_type() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        let open = manager.create_report(draft("open one")).unwrap();
        let resolved = manager.create_report(draft("resolved one")).unwrap();
        manager
            .update_status(&resolved.id, IncidentStatus::Resolved, None)
            .unwrap();
        let mut other = draft("different type");
        other.incident_type = "failed_rotation".to_string();
        manager.create_report(other).unwrap();

        let open_reports = manager.list_by_status(IncidentStatus::Open);
        assert_eq!(open_reports.len(), 2);
        assert!(open_reports.iter().any(|r| r.id == open.id));

        assert_eq!(manager.list_by_type("failed_rotation").len(), 1);
        assert_eq!(manager.list_by_type("exposed_secret").len(), 2);
    }

    #[test]
    fn status_transitions_enforce_forward_motion() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        let report = manager.create_report(draft("lifecycle")).unwrap();

        let investigating = manager
            .update_status(&report.id, IncidentStatus::Investigating, None)
            .unwrap();
        assert!(investigating.resolved_at.is_none());

        let resolved = manager
            .update_status(
                &report.id,
                IncidentStatus::Resolved,
                Some("rotated and revoked".into()),
            )
            .unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.notes.as_deref(), Some("rotated and revoked"));

        assert!(matches!(
            manager.update_status(&report.id, IncidentStatus::Open, None),
            Err(IncidentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn notifications_append_and_audit_log_grows() {
        let dir = TempDir::new().unwrap();
        let manager = IncidentManager::open(dir.path()).unwrap();
        let report = manager.create_report(draft("notify")).unwrap();

        let updated = manager
            .add_notification(
                &report.id,
                NotificationRecord {
                    channel: "chat".into(),
                    timestamp: Utc::now(),
                    success: true,
                    details: "200 OK".into(),
                },
            )
            .unwrap();
        assert_eq!(updated.notifications.len(), 1);

        let audit = fs::read_to_string(dir.path().join(".dsops/incidents/audit.log")).unwrap();
        let lines: Vec<&str> = audit.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("created"));
        assert!(lines[1].contains("notified"));
        assert!(lines[1].contains(&report.id));
    }
}
