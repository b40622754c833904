//! The sliding-window aggregation engine.
//!
//! This module contains:
//! - Reading validation and the inbound payload variant
//! - Window eviction
//! - Per-field statistics
//! - Active-key tracking
//! - The engine itself: ingest path, flush pipeline, and scheduler

pub mod evict;
pub mod reading;
pub mod stats;
pub mod tracker;

use crate::config::Config;
use crate::publish::Publisher;
use crate::store::{StoreError, Version, WindowStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Re-export commonly used types
pub use reading::{InboundPayload, Reading, ReadingError};
pub use stats::{AggregateRecord, FieldStats};
pub use tracker::ActiveKeyTracker;

/// Read-modify-write attempts before giving up on a contended key. The
/// key stays tracked, so the next flush cycle retries from scratch.
const MAX_WRITE_ATTEMPTS: u32 = 4;

/// Long-lived aggregation engine instance.
///
/// Holds all mutable engine state (tracked keys, counters) explicitly;
/// ingest handlers and the flush scheduler share one instance via `Arc`.
pub struct Engine {
    window_size: Duration,
    publish_interval: Duration,
    percentile: f64,
    store_key_prefix: String,
    fields: Vec<String>,
    store: Arc<dyn WindowStore>,
    publisher: Arc<dyn Publisher>,
    tracker: ActiveKeyTracker,
    counters: EngineCounters,
}

impl Engine {
    pub fn new(
        config: &Config,
        store: Arc<dyn WindowStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            window_size: config.window_size,
            publish_interval: config.publish_interval,
            percentile: config.percentile,
            store_key_prefix: config.store_key_prefix.clone(),
            fields: config.fields.clone(),
            store,
            publisher,
            tracker: ActiveKeyTracker::new(),
            counters: EngineCounters::new(),
        }
    }

    /// Number of currently tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.tracker.len()
    }

    /// Whether a key is currently tracked.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.tracker.is_active(key)
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    fn store_key(&self, reading_key: &str) -> String {
        format!("{}/{}", self.store_key_prefix, reading_key)
    }

    /// Validate and admit one inbound reading.
    ///
    /// Malformed payloads are dropped with a diagnostic and leave every
    /// piece of engine state untouched. Admitted readings are appended to
    /// the key's persisted window and the key is marked active.
    pub async fn ingest(&self, payload: InboundPayload) -> Result<(), IngestError> {
        let reading = match payload
            .into_value()
            .and_then(|value| Reading::from_json(&value))
        {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed reading");
                self.counters.readings_dropped.fetch_add(1, Ordering::Relaxed);
                return Err(IngestError::Invalid(e));
            }
        };

        let store_key = self.store_key(&reading.key);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (mut window, version) = self.load_window(&store_key).await;
            window.push(reading.clone());

            let bytes = serde_json::to_vec(&window).map_err(IngestError::Encode)?;
            match self.store.set(&store_key, bytes, version).await {
                Ok(_) => {
                    self.tracker.activate(&reading.key);
                    self.counters.readings_accepted.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %reading.key, window_len = window.len(), "admitted reading");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {
                    self.counters.write_conflicts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %reading.key, attempt, "ingest write conflict, retrying");
                }
                Err(e) => {
                    tracing::warn!(key = %reading.key, error = %e, "ingest store write failed");
                    self.counters.readings_dropped.fetch_add(1, Ordering::Relaxed);
                    return Err(IngestError::Store(e));
                }
            }
        }

        tracing::warn!(key = %reading.key, "ingest gave up after {MAX_WRITE_ATTEMPTS} conflicting writes");
        self.counters.readings_dropped.fetch_add(1, Ordering::Relaxed);
        Err(IngestError::Contention)
    }

    /// Run one flush cycle over a snapshot of the tracked keys, using a
    /// fresh wall-clock reference per key.
    pub async fn flush_cycle(&self) {
        self.flush_cycle_with(|| Utc::now()).await;
    }

    /// Run one flush cycle with an explicit reference time for every key.
    pub async fn flush_cycle_at(&self, now: DateTime<Utc>) {
        self.flush_cycle_with(|| now).await;
    }

    async fn flush_cycle_with(&self, now_for_key: impl Fn() -> DateTime<Utc>) {
        let snapshot = self.tracker.snapshot();
        tracing::debug!(keys = snapshot.len(), "flush cycle start");

        for key in snapshot {
            // Keys are independent: a failure here leaves the key tracked
            // for the next cycle and moves on to the rest.
            if let Err(e) = self.flush_key(&key, now_for_key()).await {
                tracing::warn!(key = %key, error = %e, "flush failed, key stays tracked");
            }
        }

        self.counters.flush_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Flush one key: load, evict, aggregate, persist the trimmed window,
    /// publish, untrack if drained.
    async fn flush_key(&self, key: &str, now: DateTime<Utc>) -> Result<(), FlushError> {
        let store_key = self.store_key(key);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (window, version) = self.load_window(&store_key).await;
            let before = window.len();
            let retained = evict::evict(window, now, self.window_size);
            if retained.len() < before {
                tracing::debug!(key, evicted = before - retained.len(), "evicted stale readings");
            }

            let bytes = serde_json::to_vec(&retained).map_err(FlushError::Encode)?;
            match self.store.set(&store_key, bytes, version).await {
                Ok(_) => {
                    if let Some(record) = stats::aggregate(
                        key,
                        &retained,
                        now,
                        self.window_size,
                        self.percentile,
                        &self.fields,
                    ) {
                        self.publisher.publish(record);
                        self.counters.records_published.fetch_add(1, Ordering::Relaxed);
                    }

                    if retained.is_empty() {
                        self.tracker.deactivate(key);
                        self.counters.keys_drained.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(key, "window drained, key untracked");
                    }
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {
                    self.counters.write_conflicts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key, attempt, "flush write conflict, retrying");
                }
                Err(e) => return Err(FlushError::Store(e)),
            }
        }

        Err(FlushError::Contention)
    }

    /// Load and decode a key's window. Absent keys, transport failures,
    /// and corrupt or non-array payloads all come back as the empty
    /// window; a later fenced write heals the stored state.
    async fn load_window(&self, store_key: &str) -> (Vec<Reading>, Version) {
        match self.store.get(store_key).await {
            Ok(Some(payload)) => match serde_json::from_slice::<Vec<Reading>>(&payload.bytes) {
                Ok(window) => (window, payload.version),
                Err(e) => {
                    tracing::warn!(store_key, error = %e, "stored window undecodable, resetting");
                    (Vec::new(), payload.version)
                }
            },
            Ok(None) => (Vec::new(), Version::ABSENT),
            Err(e) => {
                tracing::warn!(store_key, error = %e, "store read failed, treating window as empty");
                (Vec::new(), Version::ABSENT)
            }
        }
    }

    /// Drive flush cycles at the configured interval until shutdown.
    ///
    /// Fires unconditionally, with or without ingest activity. Flushing is
    /// not cancellable mid-key: shutdown is only observed between cycles.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut interval = tokio::time::interval(self.publish_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        tracing::info!(
            interval_secs = self.publish_interval.as_secs(),
            window_secs = self.window_size.as_secs(),
            "flush scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.flush_cycle().await;
                }
                _ = &mut shutdown => {
                    tracing::info!("flush scheduler stopping");
                    break;
                }
            }
        }
    }
}

/// Atomics-backed engine counters.
#[derive(Debug)]
struct EngineCounters {
    readings_accepted: AtomicU64,
    readings_dropped: AtomicU64,
    flush_cycles: AtomicU64,
    records_published: AtomicU64,
    keys_drained: AtomicU64,
    write_conflicts: AtomicU64,
}

impl EngineCounters {
    fn new() -> Self {
        Self {
            readings_accepted: AtomicU64::new(0),
            readings_dropped: AtomicU64::new(0),
            flush_cycles: AtomicU64::new(0),
            records_published: AtomicU64::new(0),
            keys_drained: AtomicU64::new(0),
            write_conflicts: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            flush_cycles: self.flush_cycles.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
            keys_drained: self.keys_drained.load(Ordering::Relaxed),
            write_conflicts: self.write_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub readings_accepted: u64,
    pub readings_dropped: u64,
    pub flush_cycles: u64,
    pub records_published: u64,
    pub keys_drained: u64,
    pub write_conflicts: u64,
}

/// Ingest failures. All are scoped to the one reading being admitted.
#[derive(Debug)]
pub enum IngestError {
    /// The payload failed validation and was dropped.
    Invalid(ReadingError),
    /// The window write failed; the reading was not admitted.
    Store(StoreError),
    /// Encoding the updated window failed.
    Encode(serde_json::Error),
    /// Retries exhausted against concurrent writers.
    Contention,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Invalid(e) => write!(f, "invalid reading: {e}"),
            IngestError::Store(e) => write!(f, "window write failed: {e}"),
            IngestError::Encode(e) => write!(f, "window encode failed: {e}"),
            IngestError::Contention => write!(f, "window write retries exhausted"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Per-key flush failures. The key stays tracked for the next cycle.
#[derive(Debug)]
pub enum FlushError {
    Store(StoreError),
    Encode(serde_json::Error),
    Contention,
}

impl std::fmt::Display for FlushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushError::Store(e) => write!(f, "window write failed: {e}"),
            FlushError::Encode(e) => write!(f, "window encode failed: {e}"),
            FlushError::Contention => write!(f, "window write retries exhausted"),
        }
    }
}

impl std::error::Error for FlushError {}
