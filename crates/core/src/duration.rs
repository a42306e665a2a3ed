//! Duration strings, including the `Nd` days form.
//!
//! TTLs arrive as strings like `"30m"`, `"12h"` or `"7d"`. A bare `Nd` is
//! normalized to N × 24 h before handing the rest to `humantime`, which
//! also understands compound forms (`"1h 30m"`).

use std::time::Duration;

use crate::error::DsopsError;

/// Parse a duration string, accepting the `Nd` days suffix
pub fn parse_duration(input: &str) -> Result<Duration, DsopsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DsopsError::configuration(
            "duration",
            trimmed,
            "empty duration string",
        ));
    }

    if let Some(days) = trimmed.strip_suffix('d') {
        if let Ok(n) = days.parse::<u64>() {
            return Ok(Duration::from_secs(n * 24 * 3600));
        }
    }

    humantime::parse_duration(trimmed).map_err(|e| {
        DsopsError::configuration("duration", trimmed, format!("unparseable duration: {e}"))
    })
}

/// Parse a TTL string into whole seconds
pub fn ttl_seconds(input: &str) -> Result<u64, DsopsError> {
    parse_duration(input).map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_suffix_is_24h_multiples() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86400));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn standard_forms_pass_through() {
        assert_eq!(parse_duration("90m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(ttl_seconds("1h").unwrap(), 3600);
    }

    #[test]
    fn garbage_is_a_configuration_error() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-3h").is_err());
    }
}
