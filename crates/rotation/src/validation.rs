//! Credential value validation.
//!
//! Checks a candidate value against the credential kind's declared format
//! and TTL. Error messages never contain the candidate value: it is
//! masked to at most the first and last three characters.

use dsops_catalog::CredentialKindDef;
use dsops_core::ttl_seconds;
use regex::Regex;
use serde::Serialize;

/// Outcome of validating a candidate value
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ValidationReport {
    /// Whether the value passed every check
    pub valid: bool,

    /// What failed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Non-fatal observations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// The kind's TTL, parsed to whole seconds, when declared and parseable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

/// Mask a value for error messages: short values vanish entirely, longer
/// ones keep three characters at each end.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}***{tail}")
    }
}

/// Validator for candidate credential values
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialValidator;

impl CredentialValidator {
    /// Stateless validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a candidate value against a credential kind
    pub fn validate(&self, kind: &CredentialKindDef, value: &str) -> ValidationReport {
        let mut report = ValidationReport {
            valid: true,
            ..ValidationReport::default()
        };

        if let Some(pattern) = &kind.constraints.format {
            match Regex::new(pattern) {
                Ok(regex) => {
                    if !regex.is_match(value) {
                        report.valid = false;
                        report.errors.push(format!(
                            "value {} does not match required format `{pattern}`",
                            mask_value(value)
                        ));
                    }
                }
                Err(e) => {
                    report.valid = false;
                    report
                        .errors
                        .push(format!("format pattern `{pattern}` is invalid: {e}"));
                }
            }
        }

        if let Some(ttl) = &kind.constraints.ttl {
            match ttl_seconds(ttl) {
                Ok(seconds) => report.ttl_seconds = Some(seconds),
                Err(_) => report
                    .warnings
                    .push(format!("declared TTL `{ttl}` is unparseable")),
            }
        }

        report
    }

    /// Validate a replacement value: everything [`validate`](Self::validate)
    /// checks, plus the new value must differ from the current one.
    pub fn validate_replacement(
        &self,
        kind: &CredentialKindDef,
        current: &str,
        new: &str,
    ) -> ValidationReport {
        let mut report = self.validate(kind, new);
        if current == new {
            report.valid = false;
            report.errors.push(format!(
                "new value {} must be different from current value",
                mask_value(new)
            ));
        }
        report
    }
}
