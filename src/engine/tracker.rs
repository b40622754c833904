//! Active-key tracking.
//!
//! A key is tracked from its first admitted reading until a flush cycle
//! finds its post-eviction window empty. Only the ingest path activates
//! and only the flush path deactivates; any later valid reading
//! re-activates a drained key.

use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory set of keys with (believed) non-empty retained windows.
#[derive(Debug, Default)]
pub struct ActiveKeyTracker {
    keys: Mutex<HashSet<String>>,
}

impl ActiveKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key active. Idempotent.
    pub fn activate(&self, key: &str) {
        let mut keys = self.keys.lock().expect("tracker lock poisoned");
        if keys.insert(key.to_string()) {
            tracing::debug!(key, "tracking new key");
        }
    }

    /// Stop tracking a key whose window drained to empty.
    pub fn deactivate(&self, key: &str) {
        let mut keys = self.keys.lock().expect("tracker lock poisoned");
        if keys.remove(key) {
            tracing::debug!(key, "stopped tracking key");
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.keys.lock().expect("tracker lock poisoned").contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().expect("tracker lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the tracked set for one flush cycle. Keys added after the
    /// snapshot wait for the next cycle.
    pub fn snapshot(&self) -> Vec<String> {
        let keys = self.keys.lock().expect("tracker lock poisoned");
        let mut snapshot: Vec<String> = keys.iter().cloned().collect();
        snapshot.sort();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_and_deactivate() {
        let tracker = ActiveKeyTracker::new();
        assert!(!tracker.is_active("a"));

        tracker.activate("a");
        assert!(tracker.is_active("a"));
        assert_eq!(tracker.len(), 1);

        tracker.deactivate("a");
        assert!(!tracker.is_active("a"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_activate_is_idempotent() {
        let tracker = ActiveKeyTracker::new();
        tracker.activate("a");
        tracker.activate("a");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_reactivation_after_drain() {
        let tracker = ActiveKeyTracker::new();
        tracker.activate("a");
        tracker.deactivate("a");
        tracker.activate("a");
        assert!(tracker.is_active("a"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let tracker = ActiveKeyTracker::new();
        tracker.activate("b");
        tracker.activate("a");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);

        // Mutations after the snapshot do not affect it.
        tracker.activate("c");
        assert_eq!(snapshot.len(), 2);
    }
}
