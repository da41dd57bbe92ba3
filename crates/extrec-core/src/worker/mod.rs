//! Background retry worker.
//!
//! A single timer loop scans the store for jobs due for retry, dispatches
//! recovery attempts (bounded fan-out across jobs), folds the outcomes
//! back through the store's serialized update, and runs the retention
//! sweep. Remediation failures never escape the loop.
//!
//! The loop has an explicit lifecycle: the composition root calls
//! `RetryWorker::start` and holds the returned handle; nothing starts as
//! an import side effect.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;

use crate::recovery::RecoveryDispatcher;
use crate::status::{unix_timestamp, ExtractionStatus, RecoveryOutcome, StatusStore};

/// Tuning for the retry worker loop.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Time between sweeps. The first sweep runs immediately at start.
    pub interval: Duration,
    /// Jobs recovered concurrently within one sweep.
    pub max_concurrent_recoveries: usize,
    /// Age past which completed records are purged.
    pub retention: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_concurrent_recoveries: 4,
            retention: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl WorkerOptions {
    pub fn from_config(cfg: &crate::config::ExtrecConfig) -> Self {
        Self {
            interval: cfg.worker_interval(),
            max_concurrent_recoveries: cfg.max_concurrent_recoveries,
            retention: cfg.retention(),
        }
    }
}

pub struct RetryWorker {
    store: Arc<StatusStore>,
    dispatcher: Arc<RecoveryDispatcher>,
    options: WorkerOptions,
}

/// Handle to a started worker; `stop` signals shutdown and joins the loop.
pub struct WorkerHandle {
    shutdown: tokio::sync::watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("retry worker join: {}", e);
        }
    }
}

impl RetryWorker {
    pub fn new(
        store: Arc<StatusStore>,
        dispatcher: Arc<RecoveryDispatcher>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            store,
            dispatcher,
            options,
        }
    }

    /// Spawn the sweep loop: once immediately, then on the fixed interval.
    pub fn start(self) -> WorkerHandle {
        let (shutdown, mut rx) = tokio::sync::watch::channel(false);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.options.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = run_sweep(&self.store, &self.dispatcher, &self.options).await {
                            tracing::warn!("retry sweep failed: {:#}", e);
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            tracing::debug!("retry worker stopped");
        });
        WorkerHandle { shutdown, task }
    }
}

/// One sweep: recover every due job, then purge stale completed records.
pub async fn run_sweep(
    store: &Arc<StatusStore>,
    dispatcher: &Arc<RecoveryDispatcher>,
    options: &WorkerOptions,
) -> Result<()> {
    let due = store.list_due_for_retry(unix_timestamp()).await;
    if !due.is_empty() {
        tracing::debug!(due = due.len(), "retry sweep");
    }

    let max_concurrent = options.max_concurrent_recoveries.max(1);
    let mut pending = due.into_iter();
    let mut join_set = JoinSet::new();
    loop {
        while join_set.len() < max_concurrent {
            let Some(status) = pending.next() else { break };
            let store = Arc::clone(store);
            let dispatcher = Arc::clone(dispatcher);
            join_set.spawn(async move {
                let catalog_id = status.catalog_id.clone();
                if let Err(e) = recover_job(&store, &dispatcher, status).await {
                    tracing::warn!(catalog_id = %catalog_id, "job recovery failed: {:#}", e);
                }
            });
        }
        if join_set.is_empty() {
            break;
        }
        let Some(res) = join_set.join_next().await else {
            break;
        };
        if let Err(e) = res {
            tracing::warn!("recovery task join: {}", e);
        }
    }

    store.purge_older_than(options.retention).await?;
    Ok(())
}

/// Recover one due job: attempt every error still holding retry budget,
/// then fold all outcomes into the store in a single update.
async fn recover_job(
    store: &StatusStore,
    dispatcher: &RecoveryDispatcher,
    status: ExtractionStatus,
) -> Result<()> {
    let catalog_id = status.catalog_id.clone();
    let mut outcomes = Vec::new();
    for error in status.errors.iter().filter(|e| e.pending_retry()) {
        let recovered = match dispatcher.attempt_recovery(&catalog_id, error).await {
            Ok(recovered) => recovered,
            Err(e) => {
                tracing::warn!(
                    catalog_id = %catalog_id,
                    category = error.category.as_str(),
                    "remediation errored, counting as failed attempt: {:#}",
                    e
                );
                false
            }
        };
        outcomes.push(RecoveryOutcome {
            category: error.category,
            page: error.page,
            recovered,
        });
    }

    let updated = store.apply_recovery_outcomes(&catalog_id, &outcomes).await?;
    if updated.is_complete {
        tracing::info!(
            catalog_id = %catalog_id,
            outcome = updated.outcome().as_str(),
            "retry processing closed out the job"
        );
    }
    Ok(())
}
