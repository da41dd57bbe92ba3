//! Terminal-outcome reporting to the owning catalog record.
//!
//! The store calls the sink exactly once per job, on the transition to
//! `is_complete`. A failed report is logged and never re-opens the job.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::status::{ExtractionStatus, JobOutcome};
use crate::taxonomy::ErrorCategory;

/// One error as carried in a terminal report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub occurred_at: i64,
}

/// Payload delivered to the catalog record updater when a job reaches a
/// terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub status: JobOutcome,
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    pub fn from_status(status: &ExtractionStatus) -> Self {
        Self {
            status: status.outcome(),
            errors: status
                .errors
                .iter()
                .map(|e| SyncError {
                    category: e.category,
                    message: e.message.clone(),
                    page: e.page,
                    occurred_at: e.occurred_at,
                })
                .collect(),
        }
    }
}

/// External catalog record updater.
///
/// Implementations should return quickly; slow transports belong behind
/// their own queue. The store invokes this inline after the mutation that
/// completed the job has been persisted.
pub trait CatalogSync: Send + Sync {
    fn report(&self, catalog_id: &str, report: &SyncReport) -> Result<()>;
}

/// Sink that only logs. Used by the CLI and by embedders that wire
/// terminal reporting elsewhere.
#[derive(Debug, Default)]
pub struct NullSync;

impl CatalogSync for NullSync {
    fn report(&self, catalog_id: &str, report: &SyncReport) -> Result<()> {
        tracing::debug!(
            catalog_id,
            status = report.status.as_str(),
            errors = report.errors.len(),
            "terminal status (no sync sink configured)"
        );
        Ok(())
    }
}
