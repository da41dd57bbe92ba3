//! Failure categories for the extraction pipeline.
//!
//! A closed classification with fixed recoverability defaults. Parsing,
//! image-extraction, and OCR faults have alternate strategies worth
//! retrying; text-association and unknown faults do not; storage faults
//! are assumed transient.

use serde::{Deserialize, Serialize};

/// Category of a failure reported during catalog extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The PDF could not be parsed (corrupt xref, bad streams, encryption).
    PdfParsing,
    /// Image extraction from a parsed page failed.
    ImageExtraction,
    /// OCR over an extracted image failed or produced unusable output.
    OcrProcessing,
    /// Extracted text could not be associated with catalog entries.
    TextAssociation,
    /// Upload to object storage failed.
    Storage,
    /// Anything we could not classify.
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::PdfParsing => "pdf_parsing",
            ErrorCategory::ImageExtraction => "image_extraction",
            ErrorCategory::OcrProcessing => "ocr_processing",
            ErrorCategory::TextAssociation => "text_association",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pdf_parsing" => ErrorCategory::PdfParsing,
            "image_extraction" => ErrorCategory::ImageExtraction,
            "ocr_processing" => ErrorCategory::OcrProcessing,
            "text_association" => ErrorCategory::TextAssociation,
            "storage" => ErrorCategory::Storage,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether a fresh error of this category should be retried at all.
    ///
    /// Text-association and unknown faults are fatal on first occurrence:
    /// no retry improves the outcome.
    pub fn recoverable_by_default(self) -> bool {
        match self {
            ErrorCategory::PdfParsing
            | ErrorCategory::ImageExtraction
            | ErrorCategory::OcrProcessing
            | ErrorCategory::Storage => true,
            ErrorCategory::TextAssociation | ErrorCategory::Unknown => false,
        }
    }
}
