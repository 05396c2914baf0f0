//! Text extraction from document bytes.
//!
//! The pipeline depends on the narrow [`TextExtractor`] interface; the
//! Tesseract implementation shells out to the system binary. Extraction
//! may legitimately produce empty text; the caller bounds the call with
//! a timeout and degrades gracefully.

mod tesseract;

pub use tesseract::{TesseractConfig, TesseractExtractor};

use async_trait::async_trait;
use thiserror::Error;

/// Text extraction errors.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("{0} not found in PATH ({1})")]
    BackendNotAvailable(&'static str, &'static str),
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// OCR/text-extraction adapter the pipeline worker consumes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from raw file bytes. The filename is used for format
    /// hints only.
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, OcrError>;
}
