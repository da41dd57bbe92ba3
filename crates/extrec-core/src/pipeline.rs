//! Stage guards for the ingestion pipeline.
//!
//! Each pipeline stage (parse, extract images, OCR, associate text,
//! upload) runs inside a guard that converts a failure into an
//! `ExtractionError` carrying the category's default recoverability and
//! retry budget, and records it against the owning job.

use anyhow::Result;

use crate::recovery;
use crate::status::{unix_timestamp, ExtractionError, StatusStore, StoreError};
use crate::taxonomy::ErrorCategory;

/// Run one stage, converting a failure into an `ExtractionError`.
///
/// The error message is the rendered cause chain; the full debug chain is
/// kept as the stack trace for diagnostics.
pub fn guard_stage<T>(
    category: ErrorCategory,
    page: Option<u32>,
    stage: impl FnOnce() -> Result<T>,
) -> Result<T, ExtractionError> {
    stage().map_err(|e| ExtractionError {
        category,
        message: format!("{e:#}"),
        stack_trace: Some(format!("{e:?}")),
        page,
        occurred_at: unix_timestamp(),
        retry_count: 0,
        max_retries: recovery::default_max_retries(category),
        recoverable: category.recoverable_by_default(),
    })
}

/// Run one stage and record its failure into the status store before
/// returning it. Recording problems are logged, never masked over the
/// stage's own error.
pub async fn run_stage<T>(
    store: &StatusStore,
    catalog_id: &str,
    category: ErrorCategory,
    page: Option<u32>,
    stage: impl FnOnce() -> Result<T>,
) -> Result<T, ExtractionError> {
    match guard_stage(category, page, stage) {
        Ok(value) => Ok(value),
        Err(err) => {
            match store.record_extraction_error(catalog_id, err.clone()).await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!(catalog_id, "stage failure reported for untracked job");
                }
                Err(e) => {
                    tracing::warn!(catalog_id, error = %e, "failed to record stage failure");
                }
            }
            Err(err)
        }
    }
}
