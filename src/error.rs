use thiserror::Error;

/// Errors raised inside the extraction pipeline.
///
/// Only `SourceUnreadable` ever crosses the orchestrator boundary; everything
/// else is absorbed into the fallback record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not open PDF: {0}")]
    SourceUnreadable(String),

    #[error("rasterization failed after all render settings: {0}")]
    RasterizationFailed(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR pass failed: {0}")]
    OcrFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
