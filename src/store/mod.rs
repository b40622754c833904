//! Keyed byte-store abstraction backing persisted windows.
//!
//! The engine never talks to durable storage directly; everything goes
//! through [`WindowStore`]. Writes are fenced with a per-key [`Version`]
//! token returned by `get`: a `set` carrying a stale token fails with
//! [`StoreError::VersionConflict`] and the caller retries its whole
//! read-modify-write cycle instead of overwriting blindly.

pub mod memory;

use async_trait::async_trait;

pub use memory::MemoryStore;

/// Per-key write-fencing token.
///
/// Tokens are opaque and monotonically ordered per key. [`Version::ABSENT`]
/// is the token for a key that has never been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(u64);

impl Version {
    /// Token for a key with no stored value.
    pub const ABSENT: Version = Version(0);

    /// The token following this one.
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A stored payload together with the fencing token to use on write-back.
#[derive(Debug, Clone)]
pub struct VersionedPayload {
    pub bytes: Vec<u8>,
    pub version: Version,
}

/// Store access errors.
#[derive(Debug)]
pub enum StoreError {
    /// The fencing token on `set` did not match the stored version.
    VersionConflict {
        expected: Version,
        actual: Version,
    },
    /// Underlying transport failure (connection, timeout, protocol).
    Transport(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::VersionConflict { expected, actual } => {
                write!(f, "version conflict: expected {expected}, store has {actual}")
            }
            StoreError::Transport(e) => write!(f, "store transport error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Asynchronous keyed byte-store with optimistic concurrency.
///
/// `get` and `set` are the only suspension points in the engine; all
/// window math is synchronous. Each `set` is atomic per call.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Fetch the payload stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<VersionedPayload>, StoreError>;

    /// Store `bytes` under `key`, fenced by the version observed on `get`
    /// (or [`Version::ABSENT`] when `get` found nothing). Returns the new
    /// version on success.
    async fn set(&self, key: &str, bytes: Vec<u8>, expected: Version)
        -> Result<Version, StoreError>;
}
