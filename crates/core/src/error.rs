//! Shared error kinds and failure classification.
//!
//! Component boundaries never panic: every observable failure maps to a
//! result or to one of these variants. Retry is the caller's concern; this
//! module only classifies.

use thiserror::Error;

/// Result type shared across dsops crates
pub type Result<T> = std::result::Result<T, DsopsError>;

/// Errors crossing component boundaries
#[derive(Debug, Error)]
pub enum DsopsError {
    /// A configuration value is wrong; never retried
    #[error("configuration error in `{field}`: {message}")]
    Configuration {
        /// The offending field
        field: String,
        /// The rejected value (already masked by the caller where sensitive)
        value: String,
        /// What is wrong with it
        message: String,
        /// A "Try:" hint, when the cause is recognized
        suggestion: Option<String>,
    },

    /// A history or incident write/read failed
    #[error("storage error: {0}")]
    Storage(String),

    /// The selected rotator cannot handle the secret
    #[error("rotator `{rotator}` does not support secret `{key}`")]
    Unsupported {
        /// Rotator name
        rotator: String,
        /// Secret logical key
        key: String,
    },

    /// A delegated HTTP call failed
    #[error("http error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Http {
        /// Response status, if a response arrived
        status: Option<u16>,
        /// What happened
        message: String,
    },

    /// A delegated subprocess failed
    #[error("process error: {message}")]
    Process {
        /// What happened
        message: String,
        /// Captured stderr, if any
        stderr: String,
    },

    /// A protocol adapter step failed
    #[error("adapter error: {0}")]
    Adapter(String),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl DsopsError {
    /// Configuration error with an optional suggestion
    pub fn configuration(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let suggestion = suggestion_for(&message).map(str::to_string);
        DsopsError::Configuration {
            field: field.into(),
            value: value.into(),
            message,
            suggestion,
        }
    }

    /// Whether this failure looks transient (worth retrying by the caller)
    pub fn is_transient(&self) -> bool {
        is_transient(&self.to_string())
    }

    /// Message for the user, with a "Try:" hint when the cause is recognized
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        match self {
            DsopsError::Configuration {
                suggestion: Some(hint),
                ..
            } => format!("{message}\nTry: {hint}"),
            _ => match suggestion_for(&message) {
                Some(hint) => format!("{message}\nTry: {hint}"),
                None => message,
            },
        }
    }
}

/// Substrings that mark a failure as transient
const TRANSIENT_MARKERS: [&str; 7] = [
    "timeout",
    "temporary failure",
    "connection reset",
    "broken pipe",
    "rate limit",
    "throttling",
    "too many requests",
];

/// Classify a failure message as transient by substring match
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// "Try:" hint for a recognized common cause, if any
pub fn suggestion_for(message: &str) -> Option<&'static str> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("no such file") || lower.contains("not found") && lower.contains("file") {
        Some("check that the path exists and is readable from the working directory")
    } else if lower.contains("missing credentials")
        || lower.contains("no credentials")
        || lower.contains("401")
        || lower.contains("unauthorized")
    {
        Some("set the credential in configuration or the matching DSOPS_* environment variable")
    } else if lower.contains("unknown host")
        || lower.contains("dns")
        || lower.contains("name or service not known")
    {
        Some("verify the host name and network reachability")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_markers_match_case_insensitively() {
        assert!(is_transient("request Timeout after 30s"));
        assert!(is_transient("upstream: Too Many Requests"));
        assert!(is_transient("read: connection reset by peer"));
        assert!(!is_transient("permission denied"));
    }

    #[test]
    fn configuration_error_carries_suggestion() {
        let err = DsopsError::configuration("webhook.auth", "***", "missing credentials for endpoint");
        assert!(err.user_message().contains("Try:"));
        match err {
            DsopsError::Configuration { suggestion, .. } => assert!(suggestion.is_some()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn unsupported_mentions_does_not_support() {
        let err = DsopsError::Unsupported {
            rotator: "overlap-random".into(),
            key: "db/password".into(),
        };
        assert!(err.to_string().contains("does not support"));
    }

    #[test]
    fn unknown_host_gets_a_hint() {
        let err = DsopsError::Http {
            status: None,
            message: "unknown host example.invalid".into(),
        };
        assert!(err.user_message().contains("Try: verify the host name"));
    }
}
