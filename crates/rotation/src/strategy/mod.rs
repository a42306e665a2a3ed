//! Strategy decorators.
//!
//! Each strategy wraps a base rotator and layers a rotation pattern on
//! top: ordering, audit entries, warnings, and error recovery. The
//! composed name is `"<strategy>-<base>"`.

mod immediate;
mod overlap;
mod two_secret;

pub use immediate::ImmediateStrategy;
pub use overlap::OverlapStrategy;
pub use two_secret::TwoSecretStrategy;

use std::time::Duration;

/// Convert a std duration for chrono arithmetic
pub(crate) fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
