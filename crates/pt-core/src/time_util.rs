//! Wall-clock timestamp helpers used for signing and local receive times.

use std::time::{SystemTime, UNIX_EPOCH};

#[inline]
fn since_epoch() -> std::time::Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    since_epoch().as_millis() as u64
}

/// Current time as **seconds** since Unix epoch.
#[inline]
pub fn now_secs() -> u64 {
    since_epoch().as_secs()
}

/// Seconds timestamp rendered the way venue login payloads expect it.
pub fn timestamp_secs_string() -> String {
    now_secs().to_string()
}
