//! # dsops-log: logging and redaction
//!
//! Process-wide logging for the rotation control plane, plus the secret
//! redaction contract: any textual rendering of a [`Secret`] yields
//! `[REDACTED]`, and [`redact`] scrubs known secret values out of free-form
//! strings before they reach a sink.
//!
//! ## Quick start
//!
//! ```rust
//! use dsops_log::{Secret, redact};
//!
//! dsops_log::auto_init().ok();
//!
//! let password = Secret::new("hunter2!");
//! tracing::info!(key = %password, "rotating");   // logs `[REDACTED]`
//! assert_eq!(format!("{password}"), "[REDACTED]");
//!
//! let line = redact("new value is hunter2!", &["hunter2!"]);
//! assert_eq!(line, "new value is [REDACTED]");
//! ```

#![forbid(unsafe_code)]

mod redaction;

pub use redaction::{REDACTED, Secret, redact};

// Re-export tracing macros so downstream crates log through one façade.
pub use tracing::{debug, error, info, warn};

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for logger operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Subscriber was already installed by someone else
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),

    /// Filter parsing error
    #[error("invalid log filter: {0}")]
    Filter(String),
}

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Diagnostic output, silenced unless explicitly enabled
    Debug,
    /// Normal operational output
    #[default]
    Info,
    /// Something surprising but recoverable
    Warn,
    /// A failed operation
    Error,
}

impl Level {
    fn as_directive(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Logger configuration
///
/// Debug output is off by default; `no_color` disables ANSI escapes for
/// plain-text sinks.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Minimum level to emit
    pub level: Level,
    /// Disable ANSI color escapes
    pub no_color: bool,
}

impl Config {
    /// Configuration with debug output enabled
    pub fn debug() -> Self {
        Self {
            level: Level::Debug,
            no_color: false,
        }
    }

    /// Monochrome configuration for non-terminal sinks
    pub fn monochrome() -> Self {
        Self {
            level: Level::Info,
            no_color: true,
        }
    }

    /// Read level from `DSOPS_LOG` (or `RUST_LOG`), colors from `NO_COLOR`
    pub fn from_env() -> Self {
        let level = std::env::var("DSOPS_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "debug" | "trace" => Some(Level::Debug),
                "info" => Some(Level::Info),
                "warn" | "warning" => Some(Level::Warn),
                "error" => Some(Level::Error),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            level,
            no_color: std::env::var_os("NO_COLOR").is_some(),
        }
    }
}

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize with environment-derived configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn auto_init() -> Result<()> {
    init_with(Config::from_env())
}

/// Initialize with default configuration
pub fn init() -> Result<()> {
    init_with(Config::default())
}

/// Initialize the process-wide logger with an explicit configuration.
///
/// The logger is global state with a set-once lifecycle: subsequent calls
/// are no-ops so test binaries and library consumers cannot race over the
/// subscriber slot.
pub fn init_with(config: Config) -> Result<()> {
    let mut result = Ok(());
    INIT.get_or_init(|| {
        let filter = EnvFilter::new(config.level.as_directive());
        result = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(!config.no_color)
            .with_target(false)
            .try_init()
            .map_err(|e| Error::AlreadyInitialized(e.to_string()));
    });
    result
}
