//! Incident report records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a security incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    /// Active compromise or data exposure
    Critical,
    /// Likely compromise, immediate action required
    High,
    /// Suspicious activity worth investigating
    Medium,
    /// Informational finding
    Low,
    /// Anything unrecognized in persisted data
    #[serde(other)]
    Unknown,
}

impl IncidentSeverity {
    /// Color strip used by chat notifications
    pub fn color(&self) -> &'static str {
        match self {
            IncidentSeverity::Critical => "#FF0000",
            IncidentSeverity::High => "#FF8C00",
            IncidentSeverity::Medium => "#FFD700",
            IncidentSeverity::Low => "#00CED1",
            IncidentSeverity::Unknown => "#808080",
        }
    }

    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSeverity::Critical => "critical",
            IncidentSeverity::High => "high",
            IncidentSeverity::Medium => "medium",
            IncidentSeverity::Low => "low",
            IncidentSeverity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Newly detected
    #[default]
    Open,
    /// Someone is on it
    Investigating,
    /// Closed out
    Resolved,
}

impl IncidentStatus {
    /// Transitions only move forward; resolution is terminal.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        matches!(
            (self, next),
            (IncidentStatus::Open, IncidentStatus::Investigating)
                | (IncidentStatus::Open, IncidentStatus::Resolved)
                | (IncidentStatus::Investigating, IncidentStatus::Resolved)
        )
    }

    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery attempt on a notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Channel name (`chat`, `issue`)
    pub channel: String,

    /// When the attempt was made
    pub timestamp: DateTime<Utc>,

    /// Whether delivery succeeded
    pub success: bool,

    /// Outcome details (status code, error text)
    #[serde(default)]
    pub details: String,
}

/// A persistently recorded security event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// `INC-YYYYMMDD-NNNNN`; assigned by the manager when empty
    #[serde(default)]
    pub id: String,

    /// Kind of event (`exposed_secret`, `failed_rotation`, …)
    pub incident_type: String,

    /// Severity classification
    pub severity: IncidentSeverity,

    /// Short headline
    pub title: String,

    /// Narrative description
    #[serde(default)]
    pub description: String,

    /// Structured evidence
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,

    /// Files involved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_files: Vec<String>,

    /// Secrets involved (logical keys, never values)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_secrets: Vec<String>,

    /// Commits involved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_commits: Vec<String>,

    /// Remediation still to do
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_required: Vec<String>,

    /// Remediation already done
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_taken: Vec<String>,

    /// Delivery attempts, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<NotificationRecord>,

    /// Current lifecycle state
    #[serde(default)]
    pub status: IncidentStatus,

    /// When the incident was recorded
    pub created_at: DateTime<Utc>,

    /// Set by the transition into `resolved`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// Free-form resolution notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl IncidentReport {
    /// Draft report with no id yet; the manager assigns one on create
    pub fn new(
        incident_type: impl Into<String>,
        severity: IncidentSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            incident_type: incident_type.into(),
            severity,
            title: title.into(),
            description: description.into(),
            details: HashMap::new(),
            affected_files: Vec::new(),
            affected_secrets: Vec::new(),
            affected_commits: Vec::new(),
            actions_required: Vec::new(),
            actions_taken: Vec::new(),
            notifications: Vec::new(),
            status: IncidentStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            notes: None,
        }
    }

    /// Attach an affected secret key
    pub fn with_affected_secret(mut self, key: impl Into<String>) -> Self {
        self.affected_secrets.push(key.into());
        self
    }

    /// Attach a required action
    pub fn with_action_required(mut self, action: impl Into<String>) -> Self {
        self.actions_required.push(action.into());
        self
    }

    /// Attach a structured detail
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// `INC-` followed by an 8-digit date and a 5-digit sequence
pub fn is_valid_incident_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("INC-") else {
        return false;
    };
    let mut parts = rest.splitn(2, '-');
    let (Some(date), Some(sequence)) = (parts.next(), parts.next()) else {
        return false;
    };
    date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && sequence.len() == 5
        && sequence.bytes().all(|b| b.is_ascii_digit())
}
