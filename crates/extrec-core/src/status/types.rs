//! Record types for the extraction status store.

use serde::{Deserialize, Serialize};

use crate::taxonomy::ErrorCategory;

/// One recorded failure within an extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionError {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Page the error occurred on; None for job-level errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Unix seconds.
    pub occurred_at: i64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub recoverable: bool,
}

impl ExtractionError {
    /// True while this error still has retry budget.
    pub fn pending_retry(&self) -> bool {
        self.recoverable && self.retry_count < self.max_retries
    }
}

/// Terminal outcome reported against the owning catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::CompletedWithErrors => "completed_with_errors",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Per-job extraction status, keyed by catalog id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionStatus {
    pub catalog_id: String,
    /// Zero when the page count is not yet known.
    pub total_pages: u32,
    pub processed_pages: u32,
    /// Page numbers already counted, kept sorted; re-reports are no-ops.
    #[serde(default)]
    pub completed_pages: Vec<u32>,
    pub errors: Vec<ExtractionError>,
    pub is_complete: bool,
    pub is_success: bool,
    pub is_retrying: bool,
    /// Unix seconds of the next retry attempt, when retrying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_time: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ExtractionStatus {
    pub(crate) fn new(catalog_id: &str, total_pages: u32, now: i64) -> Self {
        Self {
            catalog_id: catalog_id.to_string(),
            total_pages,
            processed_pages: 0,
            completed_pages: Vec::new(),
            errors: Vec::new(),
            is_complete: false,
            is_success: false,
            is_retrying: false,
            next_retry_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Any error still holding retry budget?
    pub fn has_pending_retries(&self) -> bool {
        self.errors.iter().any(ExtractionError::pending_retry)
    }

    /// All known pages reported done. False while the page count is unknown.
    pub fn pages_done(&self) -> bool {
        self.total_pages > 0 && self.processed_pages >= self.total_pages
    }

    /// Derived terminal outcome. Only meaningful once `is_complete`.
    ///
    /// A surviving job-level error (no page) or a page shortfall means the
    /// extraction as a whole failed; page-scoped leftovers after a full run
    /// are a partial result.
    pub fn outcome(&self) -> JobOutcome {
        if self.errors.is_empty() {
            JobOutcome::Completed
        } else if self.errors.iter().any(|e| e.page.is_none()) || !self.pages_done() {
            JobOutcome::Failed
        } else {
            JobOutcome::CompletedWithErrors
        }
    }

    /// Timestamp used by the retention sweep: most recent error, or creation
    /// time when the error list is empty.
    pub fn last_activity(&self) -> i64 {
        self.errors
            .iter()
            .map(|e| e.occurred_at)
            .max()
            .unwrap_or(self.created_at)
    }

    /// Terminal transition: no further mutation except purge.
    pub(crate) fn finalize(&mut self) {
        self.is_complete = true;
        self.is_success = self.errors.is_empty();
        self.is_retrying = false;
        self.next_retry_time = None;
    }

    /// Clamp retry counts, flip exhausted errors to non-recoverable, and
    /// bound page progress. Runs after every store mutation.
    pub(crate) fn enforce_invariants(&mut self) {
        for e in &mut self.errors {
            if e.retry_count >= e.max_retries {
                e.retry_count = e.max_retries;
                e.recoverable = false;
            }
        }
        if self.total_pages > 0 && self.processed_pages > self.total_pages {
            self.processed_pages = self.total_pages;
        }
    }

    /// Recompute `is_retrying`/`next_retry_time` from the error list.
    /// Keeps an already-scheduled retry time while something is pending.
    pub(crate) fn recompute_retry_state(&mut self) {
        if self.is_complete || !self.has_pending_retries() {
            self.is_retrying = false;
            self.next_retry_time = None;
        } else {
            self.is_retrying = true;
        }
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    fn err(page: Option<u32>, retry_count: u32, max_retries: u32) -> ExtractionError {
        ExtractionError {
            category: ErrorCategory::OcrProcessing,
            message: "low confidence".to_string(),
            stack_trace: None,
            page,
            occurred_at: 1_700_000_000,
            retry_count,
            max_retries,
            recoverable: retry_count < max_retries,
        }
    }

    #[test]
    fn outcome_mapping() {
        let mut s = ExtractionStatus::new("cat-1", 2, 1_700_000_000);
        assert_eq!(s.outcome(), JobOutcome::Completed);

        // Page-scoped leftover after a full run: partial result.
        s.processed_pages = 2;
        s.errors.push(err(Some(1), 2, 2));
        assert_eq!(s.outcome(), JobOutcome::CompletedWithErrors);

        // Job-level error dominates.
        s.errors.push(err(None, 0, 0));
        assert_eq!(s.outcome(), JobOutcome::Failed);

        // Page shortfall also fails.
        let mut short = ExtractionStatus::new("cat-2", 3, 1_700_000_000);
        short.errors.push(err(Some(2), 2, 2));
        assert_eq!(short.outcome(), JobOutcome::Failed);
    }

    #[test]
    fn enforce_invariants_flips_exhausted_errors() {
        let mut s = ExtractionStatus::new("cat-1", 1, 1_700_000_000);
        let mut e = err(Some(1), 5, 2);
        e.recoverable = true;
        s.errors.push(e);
        s.enforce_invariants();
        assert_eq!(s.errors[0].retry_count, 2);
        assert!(!s.errors[0].recoverable);
    }

    #[test]
    fn last_activity_prefers_latest_error() {
        let mut s = ExtractionStatus::new("cat-1", 1, 100);
        assert_eq!(s.last_activity(), 100);
        let mut a = err(Some(1), 0, 2);
        a.occurred_at = 200;
        let mut b = err(Some(1), 0, 2);
        b.occurred_at = 150;
        s.errors.push(a);
        s.errors.push(b);
        assert_eq!(s.last_activity(), 200);
    }
}
