//! Best-effort incident notification.
//!
//! Two channels: a chat webhook taking one colored attachment, and an
//! issue tracker taking a generated markdown body. Delivery failures are
//! recorded but never propagate; a report stands on its own whether or
//! not anyone heard about it.

use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::report::{IncidentReport, NotificationRecord};

/// Default HTTP timeout for notification posts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat webhook configuration; `DSOPS_SLACK_WEBHOOK` overrides the URL
#[derive(Debug, Clone, Default)]
pub struct ChatChannelConfig {
    /// Webhook URL to POST the attachment to
    pub webhook_url: Option<String>,
}

/// Issue-tracker configuration; `DSOPS_ISSUE_TOKEN` overrides the token
#[derive(Debug, Clone, Default)]
pub struct IssueChannelConfig {
    /// Host-specific issues endpoint (e.g. a repository's issues API URL)
    pub endpoint: Option<String>,

    /// Bearer token for the issues API
    pub token: Option<String>,

    /// Labels to attach to created issues
    pub labels: Vec<String>,
}

/// Configuration for both channels
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    /// Chat webhook channel
    pub chat: ChatChannelConfig,

    /// Issue tracker channel
    pub issue: IssueChannelConfig,
}

impl NotifierConfig {
    /// Apply environment overrides on top of the configured values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DSOPS_SLACK_WEBHOOK") {
            if !url.is_empty() {
                self.chat.webhook_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var("DSOPS_ISSUE_TOKEN") {
            if !token.is_empty() {
                self.issue.token = Some(token);
            }
        }
        self
    }
}

/// Pushes incident reports to the configured channels
pub struct Notifier {
    config: NotifierConfig,
    client: reqwest::Client,
}

impl Notifier {
    /// Notifier with environment overrides applied
    pub fn new(config: NotifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            config: config.with_env_overrides(),
            client,
        }
    }

    /// Notify every configured channel. Best-effort: one record per
    /// attempted channel, never an error.
    pub async fn notify(&self, report: &IncidentReport) -> Vec<NotificationRecord> {
        let mut records = Vec::new();
        if let Some(url) = self.config.chat.webhook_url.clone() {
            records.push(self.post_channel("chat", &url, None, chat_payload(report)).await);
        } else {
            debug!("chat channel not configured; skipping");
        }
        if let Some(endpoint) = self.config.issue.endpoint.clone() {
            records.push(
                self.post_channel(
                    "issue",
                    &endpoint,
                    self.config.issue.token.as_deref(),
                    issue_payload(report, &self.config.issue.labels),
                )
                .await,
            );
        } else {
            debug!("issue channel not configured; skipping");
        }
        records
    }

    async fn post_channel(
        &self,
        channel: &str,
        url: &str,
        token: Option<&str>,
        payload: Value,
    ) -> NotificationRecord {
        let mut request = self.client.post(url).json(&payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let (success, details) = match request.send().await {
            Ok(response) if response.status().is_success() => {
                (true, format!("{}", response.status()))
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(channel, %status, "notification rejected");
                (false, format!("{status}: {body}"))
            }
            Err(e) => {
                warn!(channel, error = %e, "notification failed");
                (false, e.to_string())
            }
        };
        NotificationRecord {
            channel: channel.to_string(),
            timestamp: Utc::now(),
            success,
            details,
        }
    }
}

/// One chat attachment: title, text, key fields, severity color strip
fn chat_payload(report: &IncidentReport) -> Value {
    let mut fields = vec![
        json!({"title": "ID", "value": report.id, "short": true}),
        json!({"title": "Severity", "value": report.severity.as_str(), "short": true}),
        json!({"title": "Type", "value": report.incident_type, "short": true}),
        json!({"title": "Status", "value": report.status.as_str(), "short": true}),
    ];
    if !report.affected_files.is_empty() {
        fields.push(json!({
            "title": "Affected Files",
            "value": report.affected_files.join("\n"),
            "short": false
        }));
    }
    if !report.actions_required.is_empty() {
        fields.push(json!({
            "title": "Actions Required",
            "value": report.actions_required.join("\n"),
            "short": false
        }));
    }
    json!({
        "attachments": [{
            "color": report.severity.color(),
            "title": report.title,
            "text": report.description,
            "fields": fields,
            "footer": "dsops incident response",
            "ts": report.created_at.timestamp(),
        }]
    })
}

/// Issue payload: prefixed title, markdown body, configured labels
fn issue_payload(report: &IncidentReport, labels: &[String]) -> Value {
    let mut payload = json!({
        "title": format!("[Security Incident] {}", report.title),
        "body": issue_markdown(report),
    });
    if !labels.is_empty() {
        payload["labels"] = json!(labels);
    }
    payload
}

/// The markdown body posted to the issue tracker
pub fn issue_markdown(report: &IncidentReport) -> String {
    let mut body = String::new();
    body.push_str("## Security Incident Report\n\n");
    body.push_str("| Field | Value |\n|---|---|\n");
    body.push_str(&format!("| ID | {} |\n", report.id));
    body.push_str(&format!("| Type | {} |\n", report.incident_type));
    body.push_str(&format!("| Severity | {} |\n", report.severity));
    body.push_str(&format!("| Status | {} |\n", report.status));
    body.push_str(&format!(
        "| Created | {} |\n",
        report.created_at.to_rfc3339()
    ));

    body.push_str("\n### Description\n\n");
    body.push_str(&report.description);
    body.push('\n');

    if !report.details.is_empty() {
        body.push_str("\n### Details\n\n");
        let mut keys: Vec<&String> = report.details.keys().collect();
        keys.sort();
        for key in keys {
            body.push_str(&format!("- **{key}**: {}\n", report.details[key]));
        }
    }

    if !report.affected_files.is_empty()
        || !report.affected_secrets.is_empty()
        || !report.affected_commits.is_empty()
    {
        body.push_str("\n### Affected Resources\n\n");
        for file in &report.affected_files {
            body.push_str(&format!("- File: `{file}`\n"));
        }
        for secret in &report.affected_secrets {
            body.push_str(&format!("- Secret: `{secret}`\n"));
        }
        for commit in &report.affected_commits {
            body.push_str(&format!("- Commit: `{commit}`\n"));
        }
    }

    if !report.actions_required.is_empty() || !report.actions_taken.is_empty() {
        body.push_str("\n### Actions\n\n");
        for action in &report.actions_taken {
            body.push_str(&format!("- [x] {action}\n"));
        }
        for action in &report.actions_required {
            body.push_str(&format!("- [ ] {action}\n"));
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IncidentSeverity;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> IncidentReport {
        let mut report = IncidentReport::new(
            "exposed_secret",
            IncidentSeverity::Critical,
            "API key in repository",
            "A live key was committed to main.",
        )
        .with_affected_secret("stripe/api_key")
        .with_action_required("rotate the key")
        .with_detail("repository", json!("acme/payments"));
        report.id = "INC-20260801-00001".to_string();
        report.affected_files.push("config/prod.env".to_string());
        report.actions_taken.push("revoked old key".to_string());
        report
    }

    #[test]
    fn markdown_carries_required_sections() {
        let body = issue_markdown(&report());
        assert!(body.contains("## Security Incident Report"));
        assert!(body.contains("### Description"));
        assert!(body.contains("### Details"));
        assert!(body.contains("### Affected Resources"));
        assert!(body.contains("- [x] revoked old key"));
        assert!(body.contains("- [ ] rotate the key"));
        assert!(body.contains("| ID | INC-20260801-00001 |"));
    }

    #[test]
    fn markdown_omits_empty_sections() {
        let bare = IncidentReport::new("probe", IncidentSeverity::Low, "t", "d");
        let body = issue_markdown(&bare);
        assert!(!body.contains("### Details"));
        assert!(!body.contains("### Affected Resources"));
        assert!(!body.contains("### Actions"));
    }

    #[test]
    fn chat_payload_shape() {
        let payload = chat_payload(&report());
        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "#FF0000");
        assert_eq!(attachment["footer"], "dsops incident response");
        assert_eq!(attachment["title"], "API key in repository");
        assert!(attachment["ts"].is_number());
        let fields = attachment["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["title"] == "ID"));
        assert!(fields.iter().any(|f| f["title"] == "Severity"));
    }

    #[tokio::test]
    async fn notify_posts_to_both_channels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "attachments": [{"footer": "dsops incident response"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer issue-token"))
            .and(body_partial_json(json!({
                "title": "[Security Incident] API key in repository"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(NotifierConfig {
            chat: ChatChannelConfig {
                webhook_url: Some(format!("{}/chat", server.uri())),
            },
            issue: IssueChannelConfig {
                endpoint: Some(format!("{}/issues", server.uri())),
                token: Some("issue-token".to_string()),
                labels: vec!["security".to_string()],
            },
        });

        let records = notifier.notify(&report()).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.success));
        assert_eq!(records[0].channel, "chat");
        assert_eq!(records[1].channel, "issue");
    }

    #[tokio::test]
    async fn delivery_failure_is_recorded_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let notifier = Notifier::new(NotifierConfig {
            chat: ChatChannelConfig {
                webhook_url: Some(server.uri()),
            },
            issue: IssueChannelConfig::default(),
        });

        let records = notifier.notify(&report()).await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert!(records[0].details.contains("500"));
    }

    #[tokio::test]
    async fn unconfigured_channels_are_skipped() {
        let notifier = Notifier::new(NotifierConfig::default());
        let records = notifier.notify(&report()).await;
        assert!(records.is_empty());
    }
}
