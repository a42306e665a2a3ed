//! Post-rotation verification specs and outcomes.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a verification test exercises the new credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTestType {
    /// Open a connection with the new credential
    #[default]
    Connection,
    /// Run a query
    Query,
    /// Call an API endpoint
    Api,
    /// Reachability probe
    Ping,
    /// Anything the rotator defines
    Custom,
}

/// A single post-rotation check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationTest {
    /// Test name, unique within a request
    pub name: String,

    /// Test family
    #[serde(default)]
    pub test_type: VerificationTestType,

    /// Whether a failure fails the rotation
    #[serde(default)]
    pub required: bool,

    /// Per-test timeout
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Test-specific configuration
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, String>,
}

impl VerificationTest {
    /// A required connection test
    pub fn connection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_type: VerificationTestType::Connection,
            required: true,
            timeout: None,
            config: HashMap::new(),
        }
    }
}

/// Outcome of one verification test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Name of the test that ran
    pub test: String,

    /// Whether it passed
    pub passed: bool,

    /// Whether it was required
    #[serde(default)]
    pub required: bool,

    /// Human-readable outcome
    #[serde(default)]
    pub message: String,

    /// When the test ran
    pub ran_at: DateTime<Utc>,
}

impl VerificationResult {
    /// A passing outcome
    pub fn pass(test: &VerificationTest, message: impl Into<String>) -> Self {
        Self {
            test: test.name.clone(),
            passed: true,
            required: test.required,
            message: message.into(),
            ran_at: Utc::now(),
        }
    }

    /// A failing outcome
    pub fn fail(test: &VerificationTest, message: impl Into<String>) -> Self {
        Self {
            test: test.name.clone(),
            passed: false,
            required: test.required,
            message: message.into(),
            ran_at: Utc::now(),
        }
    }
}

/// True when every required test passed
pub fn all_required_passed(results: &[VerificationResult]) -> bool {
    results.iter().all(|r| r.passed || !r.required)
}
