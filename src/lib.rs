//! Sensor Aggregator - sliding-window aggregation for keyed telemetry.
//!
//! This library consumes a stream of timestamped, keyed sensor readings,
//! retains each key's readings in a durable keyed byte-store for a bounded
//! trailing time window, and on a fixed schedule publishes per-key
//! statistical summaries while evicting stale data.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Sensor Aggregator                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐    ┌───────────┐    ┌──────────┐               │
//! │  │  Ingest  │───▶│  Window   │◀───│  Flush   │               │
//! │  │ Handler  │    │   Store   │    │Scheduler │               │
//! │  └──────────┘    └───────────┘    └──────────┘               │
//! │       │                                │                     │
//! │       ▼                                ▼                     │
//! │  ┌──────────┐    ┌───────────┐    ┌──────────┐               │
//! │  │ Active   │    │  Evict +  │───▶│ Publish  │               │
//! │  │ Keys     │    │ Aggregate │    │          │               │
//! │  └──────────┘    └───────────┘    └──────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ingest appends readings to per-key windows and marks keys active. The
//! scheduler periodically snapshots the active keys and, per key, runs
//! load → evict → aggregate → persist → publish → untrack-if-empty.
//! Store writes are fenced by a version token; a conflicting write
//! retries the whole cycle for that key.
//!
//! # Example
//!
//! ```no_run
//! use sensor_aggregator::{
//!     config::Config,
//!     engine::{Engine, InboundPayload},
//!     publish::ChannelPublisher,
//!     store::MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let config = Config::default();
//! let (publisher, mut records) = ChannelPublisher::new();
//! let engine = Arc::new(Engine::new(
//!     &config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(publisher),
//! ));
//!
//! let payload = br#"{"key":"sensor-1","timestamp":"2024-05-01T12:00:00Z","temperature":50.0}"#;
//! engine.ingest(InboundPayload::Bytes(payload.to_vec())).await.unwrap();
//!
//! engine.flush_cycle().await;
//! let record = records.recv().await.unwrap();
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod publish;
pub mod server;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use engine::{AggregateRecord, Engine, EngineStats, FieldStats, InboundPayload, Reading};
pub use publish::{ChannelPublisher, Publisher, WebhookPublisher};
pub use store::{MemoryStore, Version, WindowStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
