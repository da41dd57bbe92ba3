//! The status store: serialized mutations over an in-memory map with a
//! durable whole-store flush on every write.
//!
//! `update` is the single mutation primitive; every other write operation
//! is built on it, so no two mutations of the same job interleave. The
//! snapshot flush happens while the map lock is held: a mutation is
//! committed once persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::sync::{CatalogSync, SyncReport};
use crate::taxonomy::ErrorCategory;

use super::backoff::BackoffPolicy;
use super::persist::{JsonFileBackend, SnapshotBackend, StatusSnapshot};
use super::types::{ExtractionError, ExtractionStatus};

/// Current time as Unix seconds (store timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("extraction status already tracked for catalog {0}")]
    AlreadyExists(String),
    #[error("no extraction status tracked for catalog {0}")]
    NotFound(String),
    #[error("persist status snapshot: {0:#}")]
    Persist(anyhow::Error),
}

/// Outcome of one dispatcher attempt, folded back by the retry worker.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub category: ErrorCategory,
    pub page: Option<u32>,
    pub recovered: bool,
}

pub struct StatusStore {
    inner: Mutex<HashMap<String, ExtractionStatus>>,
    backend: Arc<dyn SnapshotBackend>,
    sync: Arc<dyn CatalogSync>,
    backoff: BackoffPolicy,
}

impl StatusStore {
    /// Open the store against the given backend, loading any existing
    /// snapshot.
    pub fn open(
        backend: Arc<dyn SnapshotBackend>,
        sync: Arc<dyn CatalogSync>,
    ) -> anyhow::Result<Self> {
        Self::open_with_backoff(backend, sync, BackoffPolicy::default())
    }

    pub fn open_with_backoff(
        backend: Arc<dyn SnapshotBackend>,
        sync: Arc<dyn CatalogSync>,
        backoff: BackoffPolicy,
    ) -> anyhow::Result<Self> {
        let statuses = backend.load()?.map(|s| s.statuses).unwrap_or_default();
        if !statuses.is_empty() {
            tracing::info!(jobs = statuses.len(), "loaded extraction status snapshot");
        }
        Ok(Self {
            inner: Mutex::new(statuses),
            backend,
            sync,
            backoff,
        })
    }

    /// Open against the default snapshot file under the XDG state dir.
    pub fn open_default(sync: Arc<dyn CatalogSync>) -> anyhow::Result<Self> {
        let path = super::persist::default_snapshot_path()?;
        Self::open(Arc::new(JsonFileBackend::new(path)), sync)
    }

    /// Start tracking a fresh job. Fails if the catalog id is already
    /// tracked; creation is the only way a new record appears.
    pub async fn initialize(
        &self,
        catalog_id: &str,
        total_pages: u32,
    ) -> Result<ExtractionStatus, StoreError> {
        let mut map = self.inner.lock().await;
        if map.contains_key(catalog_id) {
            return Err(StoreError::AlreadyExists(catalog_id.to_string()));
        }
        let status = ExtractionStatus::new(catalog_id, total_pages, unix_timestamp());
        map.insert(catalog_id.to_string(), status.clone());
        self.flush(&map)?;
        tracing::debug!(catalog_id, total_pages, "tracking new extraction job");
        Ok(status)
    }

    /// Non-mutating read.
    pub async fn get(&self, catalog_id: &str) -> Option<ExtractionStatus> {
        self.inner.lock().await.get(catalog_id).cloned()
    }

    /// Atomic read-modify-write of a single record. Invariants are enforced
    /// after the mutator, the snapshot is flushed before returning, and the
    /// terminal sync call fires (outside the lock) when this mutation
    /// completed the job.
    pub async fn update<F>(&self, catalog_id: &str, mutate: F) -> Result<ExtractionStatus, StoreError>
    where
        F: FnOnce(&mut ExtractionStatus),
    {
        let (updated, became_terminal) = {
            let mut map = self.inner.lock().await;
            let status = map
                .get_mut(catalog_id)
                .ok_or_else(|| StoreError::NotFound(catalog_id.to_string()))?;
            let was_complete = status.is_complete;
            mutate(status);
            status.enforce_invariants();
            status.recompute_retry_state();
            status.updated_at = unix_timestamp();
            let updated = status.clone();
            let became_terminal = !was_complete && updated.is_complete;
            self.flush(&map)?;
            (updated, became_terminal)
        };
        if became_terminal {
            self.report_terminal(&updated);
        }
        Ok(updated)
    }

    /// Report a failure. An unresolved error of the same `(category, page)`
    /// that still has retry budget absorbs the report as a retry-count
    /// increment with doubled backoff; otherwise a new entry is appended
    /// and, when recoverable, scheduled after the base delay.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_error(
        &self,
        catalog_id: &str,
        category: ErrorCategory,
        message: impl Into<String>,
        page: Option<u32>,
        recoverable: bool,
        max_retries: u32,
    ) -> Result<ExtractionStatus, StoreError> {
        self.record_extraction_error(
            catalog_id,
            ExtractionError {
                category,
                message: message.into(),
                stack_trace: None,
                page,
                occurred_at: unix_timestamp(),
                retry_count: 0,
                max_retries,
                recoverable,
            },
        )
        .await
    }

    /// As `record_error`, but with a fully-built error (stage guards carry
    /// stack traces).
    pub async fn record_extraction_error(
        &self,
        catalog_id: &str,
        err: ExtractionError,
    ) -> Result<ExtractionStatus, StoreError> {
        let backoff = self.backoff;
        let now = unix_timestamp();
        self.update(catalog_id, move |status| {
            if status.is_complete {
                tracing::debug!(
                    catalog_id = %status.catalog_id,
                    "error reported for completed job, ignoring"
                );
                return;
            }
            let existing = status
                .errors
                .iter()
                .position(|e| e.category == err.category && e.page == err.page && e.pending_retry());
            match existing {
                Some(i) => {
                    let entry = &mut status.errors[i];
                    entry.retry_count += 1;
                    entry.occurred_at = now;
                    if entry.pending_retry() {
                        let delay = backoff.delay_for(entry.retry_count);
                        status.next_retry_time = Some(now + delay.as_secs() as i64);
                    }
                }
                None => {
                    let recoverable = err.recoverable && err.max_retries > 0;
                    status.errors.push(err);
                    if recoverable {
                        let delay = backoff.delay_for(0);
                        status.next_retry_time = Some(now + delay.as_secs() as i64);
                    }
                }
            }
            if status.pages_done() && !status.has_pending_retries() {
                status.finalize();
            }
        })
        .await
    }

    /// Count a completed page. Idempotent per page number; never
    /// un-completes a finished job. Completion fires once all pages are
    /// processed and no retriable error remains.
    pub async fn record_page_processed(
        &self,
        catalog_id: &str,
        page: u32,
    ) -> Result<ExtractionStatus, StoreError> {
        self.update(catalog_id, move |status| {
            if status.is_complete {
                return;
            }
            match status.completed_pages.binary_search(&page) {
                Ok(_) => return,
                Err(idx) => status.completed_pages.insert(idx, page),
            }
            status.processed_pages = status.completed_pages.len() as u32;
            if status.pages_done() && !status.has_pending_retries() {
                status.finalize();
            }
        })
        .await
    }

    /// Force-terminate a job as failed: append a job-level non-recoverable
    /// error and suppress any further retries.
    pub async fn complete_with_fatal_error(
        &self,
        catalog_id: &str,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Result<ExtractionStatus, StoreError> {
        let message = message.into();
        let now = unix_timestamp();
        self.update(catalog_id, move |status| {
            if status.is_complete {
                return;
            }
            status.errors.push(ExtractionError {
                category,
                message,
                stack_trace: None,
                page: None,
                occurred_at: now,
                retry_count: 0,
                max_retries: 0,
                recoverable: false,
            });
            status.finalize();
        })
        .await
    }

    /// Fold a retry sweep's outcomes into the job: drop recovered errors,
    /// increment failed ones (rescheduling or exhausting them), and
    /// finalize when nothing pending remains.
    pub async fn apply_recovery_outcomes(
        &self,
        catalog_id: &str,
        outcomes: &[RecoveryOutcome],
    ) -> Result<ExtractionStatus, StoreError> {
        let backoff = self.backoff;
        let now = unix_timestamp();
        let outcomes = outcomes.to_vec();
        self.update(catalog_id, move |status| {
            if status.is_complete {
                return;
            }
            for outcome in &outcomes {
                let pos = status.errors.iter().position(|e| {
                    e.category == outcome.category && e.page == outcome.page && e.pending_retry()
                });
                let Some(i) = pos else { continue };
                if outcome.recovered {
                    status.errors.remove(i);
                } else {
                    let entry = &mut status.errors[i];
                    entry.retry_count += 1;
                    if entry.retry_count >= entry.max_retries {
                        entry.recoverable = false;
                    } else {
                        let delay = backoff.delay_for(entry.retry_count);
                        status.next_retry_time = Some(now + delay.as_secs() as i64);
                    }
                }
            }
            // Finalize only when this sweep actually attempted something;
            // a stale due-listing must not complete an untouched job.
            if !outcomes.is_empty() && !status.has_pending_retries() {
                status.finalize();
            }
        })
        .await
    }

    /// All records with `is_complete == false`.
    pub async fn list_active(&self) -> Vec<ExtractionStatus> {
        let map = self.inner.lock().await;
        let mut out: Vec<_> = map.values().filter(|s| !s.is_complete).cloned().collect();
        out.sort_by(|a, b| a.catalog_id.cmp(&b.catalog_id));
        out
    }

    /// All records due for a retry attempt at `now`.
    pub async fn list_due_for_retry(&self, now: i64) -> Vec<ExtractionStatus> {
        let map = self.inner.lock().await;
        let mut out: Vec<_> = map
            .values()
            .filter(|s| {
                !s.is_complete && s.is_retrying && s.next_retry_time.is_some_and(|t| t <= now)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.catalog_id.cmp(&b.catalog_id));
        out
    }

    /// Every tracked record, newest first. Inspection surface for the CLI.
    pub async fn list_all(&self) -> Vec<ExtractionStatus> {
        let map = self.inner.lock().await;
        let mut out: Vec<_> = map.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.catalog_id.cmp(&b.catalog_id)));
        out
    }

    /// Retention sweep: drop completed records whose most recent error (or
    /// creation time) is older than `max_age`. Active jobs are never
    /// touched. Returns the number of records removed.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize, StoreError> {
        let cutoff = unix_timestamp() - max_age.as_secs() as i64;
        let mut map = self.inner.lock().await;
        let before = map.len();
        map.retain(|_, s| !s.is_complete || s.last_activity() >= cutoff);
        let removed = before - map.len();
        if removed > 0 {
            self.flush(&map)?;
            tracing::info!(removed, "purged completed extraction records");
        }
        Ok(removed)
    }

    fn flush(&self, map: &HashMap<String, ExtractionStatus>) -> Result<(), StoreError> {
        let snapshot = StatusSnapshot {
            version: 1,
            statuses: map.clone(),
        };
        self.backend.save(&snapshot).map_err(StoreError::Persist)
    }

    fn report_terminal(&self, status: &ExtractionStatus) {
        let report = SyncReport::from_status(status);
        tracing::info!(
            catalog_id = %status.catalog_id,
            outcome = report.status.as_str(),
            errors = report.errors.len(),
            "extraction job reached terminal state"
        );
        if let Err(e) = self.sync.report(&status.catalog_id, &report) {
            tracing::warn!(
                catalog_id = %status.catalog_id,
                "catalog sync failed; job stays terminal: {:#}",
                e
            );
        }
    }
}
