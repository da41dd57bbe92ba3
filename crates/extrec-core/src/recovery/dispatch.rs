//! Strategy selection and dispatch.
//!
//! `select_action` is the pure attempt ladder; `RecoveryDispatcher` invokes
//! the selected hook on the blocking pool under a timeout and reports plain
//! success/failure back to the worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::status::ExtractionError;
use crate::taxonomy::ErrorCategory;

use super::hooks::RemediationHooks;

/// Which remediation the ladder selects for a (category, attempt) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    SwitchParsingBackend,
    RepairSourceStructure,
    AlternateImageExtraction,
    ReducedQualityExtraction,
    AlternateOcrEngine,
    AlternateOcrPreprocessing,
    LowerResolutionOcr,
    RetryStorageUpload,
}

/// Default retry budget per category. Instances may override via
/// `max_retries` on the recorded error.
pub fn default_max_retries(category: ErrorCategory) -> u32 {
    match category {
        ErrorCategory::PdfParsing | ErrorCategory::ImageExtraction => 2,
        ErrorCategory::OcrProcessing | ErrorCategory::Storage => 3,
        ErrorCategory::TextAssociation | ErrorCategory::Unknown => 0,
    }
}

/// The attempt ladder: which remediation applies at the given attempt
/// number, or None when the category has nothing left to try.
pub fn select_action(category: ErrorCategory, attempt: u32) -> Option<RecoveryAction> {
    match (category, attempt) {
        (ErrorCategory::PdfParsing, 0) => Some(RecoveryAction::SwitchParsingBackend),
        (ErrorCategory::PdfParsing, 1) => Some(RecoveryAction::RepairSourceStructure),
        (ErrorCategory::ImageExtraction, 0) => Some(RecoveryAction::AlternateImageExtraction),
        (ErrorCategory::ImageExtraction, 1) => Some(RecoveryAction::ReducedQualityExtraction),
        (ErrorCategory::OcrProcessing, 0) => Some(RecoveryAction::AlternateOcrEngine),
        (ErrorCategory::OcrProcessing, 1) => Some(RecoveryAction::AlternateOcrPreprocessing),
        (ErrorCategory::OcrProcessing, 2) => Some(RecoveryAction::LowerResolutionOcr),
        // Storage faults are assumed transient: same remediation, bounded attempts.
        (ErrorCategory::Storage, n) if n < 3 => Some(RecoveryAction::RetryStorageUpload),
        _ => None,
    }
}

/// Dispatches recovery attempts to the pipeline's remediation hooks.
pub struct RecoveryDispatcher {
    hooks: Arc<dyn RemediationHooks>,
    timeout: Duration,
}

impl RecoveryDispatcher {
    pub fn new(hooks: Arc<dyn RemediationHooks>, timeout: Duration) -> Self {
        Self { hooks, timeout }
    }

    /// Attempt recovery for one error. Ok(true) means recovered; a
    /// timed-out remediation counts as a failed attempt. The in-flight
    /// call is not cancelled on timeout, only abandoned.
    pub async fn attempt_recovery(
        &self,
        catalog_id: &str,
        error: &ExtractionError,
    ) -> Result<bool> {
        let Some(action) = select_action(error.category, error.retry_count) else {
            return Ok(false);
        };
        tracing::debug!(
            catalog_id,
            category = error.category.as_str(),
            attempt = error.retry_count,
            ?action,
            "attempting recovery"
        );

        let hooks = Arc::clone(&self.hooks);
        let id = catalog_id.to_string();
        let attempt = error.retry_count;
        let call = tokio::task::spawn_blocking(move || match action {
            RecoveryAction::SwitchParsingBackend => hooks.switch_parsing_backend(&id, attempt),
            RecoveryAction::RepairSourceStructure => hooks.repair_source_structure(&id, attempt),
            RecoveryAction::AlternateImageExtraction => {
                hooks.alternate_image_extraction(&id, attempt)
            }
            RecoveryAction::ReducedQualityExtraction => {
                hooks.reduced_quality_extraction(&id, attempt)
            }
            RecoveryAction::AlternateOcrEngine => hooks.alternate_ocr_engine(&id, attempt),
            RecoveryAction::AlternateOcrPreprocessing => {
                hooks.alternate_ocr_preprocessing(&id, attempt)
            }
            RecoveryAction::LowerResolutionOcr => hooks.lower_resolution_ocr(&id, attempt),
            RecoveryAction::RetryStorageUpload => hooks.retry_storage_upload(&id, attempt),
        });

        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                tracing::warn!(catalog_id, ?action, "remediation timed out");
                Ok(false)
            }
            Ok(join) => join.context("remediation task join")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Hooks that return a scripted result and count invocations.
    struct ScriptedHooks {
        result: Result<bool, String>,
        block_for: Option<Duration>,
        calls: AtomicU32,
    }

    impl ScriptedHooks {
        fn returning(result: bool) -> Self {
            Self {
                result: Ok(result),
                block_for: None,
                calls: AtomicU32::new(0),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                result: Err(msg.to_string()),
                block_for: None,
                calls: AtomicU32::new(0),
            }
        }

        fn blocking(d: Duration) -> Self {
            Self {
                result: Ok(true),
                block_for: Some(d),
                calls: AtomicU32::new(0),
            }
        }

        fn invoke(&self) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.block_for {
                std::thread::sleep(d);
            }
            match &self.result {
                Ok(b) => Ok(*b),
                Err(msg) => Err(anyhow::anyhow!("{msg}")),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemediationHooks for ScriptedHooks {
        fn switch_parsing_backend(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn repair_source_structure(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn alternate_image_extraction(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn reduced_quality_extraction(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn alternate_ocr_engine(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn alternate_ocr_preprocessing(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn lower_resolution_ocr(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
        fn retry_storage_upload(&self, _: &str, _: u32) -> Result<bool> {
            self.invoke()
        }
    }

    fn error_at(category: ErrorCategory, retry_count: u32) -> ExtractionError {
        ExtractionError {
            category,
            message: "boom".to_string(),
            stack_trace: None,
            page: Some(1),
            occurred_at: 1_700_000_000,
            retry_count,
            max_retries: default_max_retries(category),
            recoverable: category.recoverable_by_default(),
        }
    }

    #[test]
    fn ladder_selection_table() {
        use ErrorCategory::*;
        use RecoveryAction::*;
        assert_eq!(select_action(PdfParsing, 0), Some(SwitchParsingBackend));
        assert_eq!(select_action(PdfParsing, 1), Some(RepairSourceStructure));
        assert_eq!(select_action(PdfParsing, 2), None);
        assert_eq!(select_action(ImageExtraction, 0), Some(AlternateImageExtraction));
        assert_eq!(select_action(ImageExtraction, 1), Some(ReducedQualityExtraction));
        assert_eq!(select_action(ImageExtraction, 2), None);
        assert_eq!(select_action(OcrProcessing, 0), Some(AlternateOcrEngine));
        assert_eq!(select_action(OcrProcessing, 1), Some(AlternateOcrPreprocessing));
        assert_eq!(select_action(OcrProcessing, 2), Some(LowerResolutionOcr));
        assert_eq!(select_action(OcrProcessing, 3), None);
        assert_eq!(select_action(Storage, 0), Some(RetryStorageUpload));
        assert_eq!(select_action(Storage, 2), Some(RetryStorageUpload));
        assert_eq!(select_action(Storage, 3), None);
        assert_eq!(select_action(TextAssociation, 0), None);
        assert_eq!(select_action(Unknown, 0), None);
    }

    #[test]
    fn default_budgets_match_the_ladder() {
        use ErrorCategory::*;
        for cat in [PdfParsing, ImageExtraction, OcrProcessing, TextAssociation, Storage, Unknown]
        {
            let budget = default_max_retries(cat);
            if budget > 0 {
                assert!(select_action(cat, budget - 1).is_some());
            }
            assert_eq!(select_action(cat, budget), None);
        }
    }

    #[tokio::test]
    async fn successful_hook_reports_recovery() {
        let hooks = Arc::new(ScriptedHooks::returning(true));
        let d = RecoveryDispatcher::new(hooks.clone(), Duration::from_secs(5));
        let ok = d
            .attempt_recovery("cat-1", &error_at(ErrorCategory::OcrProcessing, 0))
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(hooks.calls(), 1);
    }

    #[tokio::test]
    async fn ineligible_category_skips_the_hooks() {
        let hooks = Arc::new(ScriptedHooks::returning(true));
        let d = RecoveryDispatcher::new(hooks.clone(), Duration::from_secs(5));
        let ok = d
            .attempt_recovery("cat-1", &error_at(ErrorCategory::TextAssociation, 0))
            .await
            .unwrap();
        assert!(!ok);
        let ok = d
            .attempt_recovery("cat-1", &error_at(ErrorCategory::PdfParsing, 2))
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(hooks.calls(), 0);
    }

    #[tokio::test]
    async fn hook_error_propagates_to_the_caller() {
        let hooks = Arc::new(ScriptedHooks::failing("ocr engine crashed"));
        let d = RecoveryDispatcher::new(hooks, Duration::from_secs(5));
        let err = d
            .attempt_recovery("cat-1", &error_at(ErrorCategory::OcrProcessing, 0))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("ocr engine crashed"));
    }

    #[tokio::test]
    async fn timed_out_hook_counts_as_failed_attempt() {
        let hooks = Arc::new(ScriptedHooks::blocking(Duration::from_millis(200)));
        let d = RecoveryDispatcher::new(hooks.clone(), Duration::from_millis(20));
        let ok = d
            .attempt_recovery("cat-1", &error_at(ErrorCategory::Storage, 0))
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(hooks.calls(), 1);
    }
}
