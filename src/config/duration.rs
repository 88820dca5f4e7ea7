//! Human-readable durations for `lid.yaml`: "500ms", "5s", "1m", or a bare
//! number of seconds.

use crate::error::{Error, Result};
use std::time::Duration;

/// Parse a duration string like "10s", "30s", "1m", "500ms".
///
/// Returns `None` if the string cannot be parsed.
///
/// ```
/// use lid::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(parse_duration_string("1m"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_duration_string("30"), Some(Duration::from_secs(30)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();

    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Parse an optional duration field, falling back to `default` when absent.
pub(crate) fn duration_or(
    service: &str,
    field: &str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration_string(raw).ok_or_else(|| {
            Error::Config(format!(
                "service '{}': invalid {} '{}' (use e.g. 500ms, 5s, 1m)",
                service, field, raw
            ))
        }),
    }
}
