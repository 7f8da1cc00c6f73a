//! Wall-clock helpers shared by the relay and record rendering.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whether `claimed` lies within `max_skew_ms` of `now` in either direction.
///
/// Negative claims are never plausible.
pub fn is_plausible(claimed: i64, now: u64, max_skew_ms: u64) -> bool {
    let Ok(claimed) = u64::try_from(claimed) else {
        return false;
    };
    claimed.abs_diff(now) <= max_skew_ms
}
