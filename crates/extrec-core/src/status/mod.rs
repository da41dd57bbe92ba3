//! Durable per-job extraction status.
//!
//! Tracks pages processed, accumulated errors, and retry state per catalog
//! id; the single source of truth for job progress. Every mutation is
//! flushed to a whole-store JSON snapshot so a crash restart resumes from
//! the last committed write.

mod backoff;
mod persist;
mod store;
mod types;


pub use backoff::BackoffPolicy;
pub use persist::{
    default_snapshot_path, JsonFileBackend, MemoryBackend, SnapshotBackend, StatusSnapshot,
};
pub use store::{RecoveryOutcome, StatusStore, StoreError};
pub use types::{ExtractionError, ExtractionStatus, JobOutcome};

pub(crate) use store::unix_timestamp;
