//! Remediation hooks supplied by the ingestion pipeline.

use anyhow::Result;

/// Concrete remediation actions, one callable per strategy rung.
///
/// Implementations are synchronous and may block (they re-run parsing,
/// OCR, or uploads); the dispatcher runs them on the blocking pool under a
/// timeout. `attempt` is the error's current retry count. Ok(true) means
/// the underlying fault was fixed and the error can be cleared.
pub trait RemediationHooks: Send + Sync {
    /// Re-parse with an alternate PDF backend.
    fn switch_parsing_backend(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Structural repair of the source file, then re-parse.
    fn repair_source_structure(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Extract images with an alternate method.
    fn alternate_image_extraction(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Extract images at reduced quality.
    fn reduced_quality_extraction(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Re-run OCR with an alternate engine.
    fn alternate_ocr_engine(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Re-run OCR with an alternate preprocessing pipeline.
    fn alternate_ocr_preprocessing(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Re-run OCR at lower resolution.
    fn lower_resolution_ocr(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
    /// Retry the object-storage upload.
    fn retry_storage_upload(&self, catalog_id: &str, attempt: u32) -> Result<bool>;
}
