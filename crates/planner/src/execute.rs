//! Plan execution.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::ProtocolAdapter;
use crate::plan::{Plan, PlanAction, PlanStep};

/// Record of one step's execution (or of it being skipped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    /// Step name
    pub name: String,

    /// The action performed
    pub action: PlanAction,

    /// Whether it succeeded
    pub success: bool,

    /// Whether it was skipped because an earlier step failed
    #[serde(default)]
    pub skipped: bool,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// How long it took
    pub duration_ms: u64,

    /// Error message, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Adapter output for the step
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub output: HashMap<String, String>,
}

/// Aggregate outcome of a plan run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// Fingerprint of the executed plan
    pub plan_fingerprint: String,

    /// Adapter that executed it
    pub adapter: String,

    /// Whether every executed step succeeded
    pub success: bool,

    /// Per-step records, in plan order
    pub steps: Vec<ExecutedStep>,

    /// Propagated output (`value`, `serial_number` from a created credential)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

fn skipped_step(step: &PlanStep) -> ExecutedStep {
    ExecutedStep {
        name: step.name.clone(),
        action: step.action,
        success: false,
        skipped: true,
        started_at: Utc::now(),
        duration_ms: 0,
        error: Some("skipped: an earlier step failed".to_string()),
        output: HashMap::new(),
    }
}

/// Run a plan's steps in order through one adapter.
///
/// The first failure short-circuits: remaining steps are recorded as
/// skipped. A successful `create` step's `value` and `serial_number`
/// propagate into the outcome metadata.
pub async fn execute_plan(adapter: &dyn ProtocolAdapter, plan: &Plan) -> PlanOutcome {
    let mut outcome = PlanOutcome {
        plan_fingerprint: plan.fingerprint.clone(),
        adapter: adapter.name().to_string(),
        success: true,
        steps: Vec::with_capacity(plan.steps.len()),
        metadata: HashMap::new(),
    };

    let mut failed = false;
    for step in &plan.steps {
        if failed {
            outcome.steps.push(skipped_step(step));
            continue;
        }

        let started_at = Utc::now();
        let timer = Instant::now();
        debug!(step = %step.name, adapter = %adapter.name(), "executing plan step");
        match adapter.execute(plan, step).await {
            Ok(output) => {
                if step.action == PlanAction::Create {
                    for key in ["value", "serial_number"] {
                        if let Some(value) = output.metadata.get(key) {
                            outcome.metadata.insert(key.to_string(), value.clone());
                        }
                    }
                }
                outcome.steps.push(ExecutedStep {
                    name: step.name.clone(),
                    action: step.action,
                    success: true,
                    skipped: false,
                    started_at,
                    duration_ms: timer.elapsed().as_millis() as u64,
                    error: None,
                    output: output.metadata,
                });
            }
            Err(e) => {
                failed = true;
                outcome.success = false;
                outcome.steps.push(ExecutedStep {
                    name: step.name.clone(),
                    action: step.action,
                    success: false,
                    skipped: false,
                    started_at,
                    duration_ms: timer.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                    output: HashMap::new(),
                });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOutput;
    use async_trait::async_trait;
    use dsops_core::{DsopsError, Result};

    /// Fails on the named step, succeeds elsewhere.
    struct FailsOn(&'static str);

    #[async_trait]
    impl ProtocolAdapter for FailsOn {
        fn name(&self) -> &str {
            "fails-on"
        }

        async fn execute(&self, _plan: &Plan, step: &PlanStep) -> Result<AdapterOutput> {
            if step.name == self.0 {
                Err(DsopsError::Adapter(format!("{} blew up", step.name)))
            } else {
                Ok(AdapterOutput::message("ok").with_metadata("value", "v-123456"))
            }
        }
    }

    fn plan() -> Plan {
        Plan {
            fingerprint: "fp".into(),
            created_at: Utc::now(),
            service_type: "postgresql".into(),
            credential_kind: "password".into(),
            strategy: "two-key".into(),
            steps: vec![
                PlanStep::new("create_new", "", PlanAction::Create, "db"),
                PlanStep::new("verify_new", "", PlanAction::Verify, "db"),
                PlanStep::new("promote_new", "", PlanAction::Promote, "db"),
                PlanStep::new("revoke_old", "", PlanAction::Delete, "db"),
            ],
        }
    }

    #[tokio::test]
    async fn failure_skips_the_rest() {
        let outcome = execute_plan(&FailsOn("verify_new"), &plan()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.steps.len(), 4);
        assert!(outcome.steps[0].success);
        assert!(!outcome.steps[1].success && !outcome.steps[1].skipped);
        assert!(outcome.steps[1].error.as_deref().unwrap().contains("blew up"));
        assert!(outcome.steps[2].skipped);
        assert!(outcome.steps[3].skipped);
    }

    #[tokio::test]
    async fn create_output_propagates_into_metadata() {
        let outcome = execute_plan(&FailsOn("nothing"), &plan()).await;
        assert!(outcome.success);
        assert_eq!(outcome.metadata.get("value").map(String::as_str), Some("v-123456"));
        assert!(outcome.steps.iter().all(|s| s.success));
    }
}
