//! In-memory [`WindowStore`] implementation.
//!
//! Backs the binary's default mode and the test suite. Versioning follows
//! the same fencing contract an external state store would provide.

use crate::store::{StoreError, Version, VersionedPayload, WindowStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local keyed byte-store with per-key version counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Version, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a payload.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<VersionedPayload>, StoreError> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries.get(key).map(|(version, bytes)| VersionedPayload {
            bytes: bytes.clone(),
            version: *version,
        }))
    }

    async fn set(
        &self,
        key: &str,
        bytes: Vec<u8>,
        expected: Version,
    ) -> Result<Version, StoreError> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let actual = entries
            .get(key)
            .map(|(version, _)| *version)
            .unwrap_or(Version::ABSENT);

        if actual != expected {
            return Err(StoreError::VersionConflict { expected, actual });
        }

        let next = actual.next();
        entries.insert(key.to_string(), (next, bytes));
        Ok(next)
    }
}
