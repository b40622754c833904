//! Window eviction.
//!
//! A reading stays in the window iff its age relative to the flush-time
//! reference instant is at most `window_size` (inclusive boundary). The
//! reference is captured once at the start of a key's pipeline so every
//! reading in one cycle sees the same cutoff.

use crate::engine::reading::Reading;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Drop readings older than `window_size` relative to `now`.
///
/// Pure function; readings with timestamps in the future (relative to
/// `now`) have non-positive age and are retained.
pub fn evict(window: Vec<Reading>, now: DateTime<Utc>, window_size: Duration) -> Vec<Reading> {
    let cutoff = chrono::Duration::from_std(window_size).unwrap_or(chrono::Duration::MAX);
    window
        .into_iter()
        .filter(|reading| now - reading.timestamp <= cutoff)
        .collect()
}
