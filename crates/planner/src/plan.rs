//! Plans and their steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a plan step does to the target service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// Bring a new credential into existence
    Create,
    /// Check a credential works
    Verify,
    /// Make a credential the active one
    Promote,
    /// Remove a credential
    Delete,
}

impl PlanAction {
    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::Create => "create",
            PlanAction::Verify => "verify",
            PlanAction::Promote => "promote",
            PlanAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step name (`create_new`, `verify_rotated`, …)
    pub name: String,

    /// What the step does, for humans
    pub description: String,

    /// The action performed against the target
    pub action: PlanAction,

    /// Instance or service the step targets
    pub target: String,
}

impl PlanStep {
    /// Build a step
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        action: PlanAction,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            action,
            target: target.into(),
        }
    }
}

/// An ordered list of steps synthesized from a service definition.
///
/// The fingerprint is deterministic over the request, so identical
/// requests produce identical fingerprints for deduplication and
/// cross-referencing; `created_at` stamps this particular synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Deterministic identifier of the request that produced the plan
    pub fingerprint: String,

    /// When the plan was synthesized
    pub created_at: DateTime<Utc>,

    /// Service type the plan is for
    pub service_type: String,

    /// Credential kind the plan rotates
    pub credential_kind: String,

    /// Strategy the steps follow
    pub strategy: String,

    /// The steps, in execution order
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Steps with a given action
    pub fn steps_with_action(&self, action: PlanAction) -> Vec<&PlanStep> {
        self.steps.iter().filter(|s| s.action == action).collect()
    }
}
