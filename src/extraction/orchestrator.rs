// Extraction orchestrator - sequences the pipeline with its fallback policy
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::{fields, line_items, ocr, rasterizer, text_layer};
use crate::error::ExtractionError;
use crate::models::ExtractedReceipt;

/// Handle to the process-wide OCR engine. Model loading happens once; the
/// mutex serializes inference between concurrent uploads.
pub type SharedOcrEngine = Arc<Mutex<ocr::OcrEngine>>;

pub struct ExtractionPipeline {
    ocr: SharedOcrEngine,
}

impl ExtractionPipeline {
    pub fn new(ocr: SharedOcrEngine) -> Self {
        Self { ocr }
    }

    /// Run the whole pipeline over one uploaded PDF.
    ///
    /// Direct text layer first; OCR only when the layer is blank; the raw
    /// text-layer output again as last resort when OCR fails. A document
    /// that yields no text at all still produces the well-formed fallback
    /// record. The only error surfaced to the caller is a structurally
    /// unreadable source.
    pub fn extract(&self, pdf_path: &Path) -> Result<ExtractedReceipt, ExtractionError> {
        let direct_text = text_layer::extract_text(pdf_path)?;

        let text = if direct_text.trim().is_empty() {
            debug!("no embedded text layer; trying OCR");
            match self.ocr_text(pdf_path) {
                Ok(ocr_text) if !ocr_text.trim().is_empty() => ocr_text,
                Ok(_) => {
                    debug!("OCR produced no usable text; keeping text-layer output");
                    direct_text
                }
                Err(e) => {
                    warn!(error = %e, "OCR pass failed; keeping text-layer output");
                    direct_text
                }
            }
        } else {
            debug!(chars = direct_text.len(), "using embedded text layer");
            direct_text
        };

        if text.trim().is_empty() {
            warn!("no text recovered from any source; producing fallback record");
            return Ok(ExtractedReceipt::fallback());
        }

        let parsed = fields::parse_fields(&text);
        let items = line_items::parse_line_items(&text);

        let record = ExtractedReceipt {
            merchant: parsed.merchant,
            timestamp: parsed.timestamp,
            total_amount: parsed.total_amount,
            items,
        };
        info!(
            merchant = record.merchant.as_deref(),
            total = record.total_amount,
            items = record.items.len(),
            "extraction complete"
        );
        Ok(record)
    }

    /// Rasterize every page and run the shared OCR engine over each one.
    /// Per-page OCR failures leave that page blank rather than failing the
    /// document.
    fn ocr_text(&self, pdf_path: &Path) -> Result<String, ExtractionError> {
        let pages = rasterizer::rasterize_pages(pdf_path)?;

        let mut engine = self
            .ocr
            .lock()
            .map_err(|_| ExtractionError::OcrUnavailable("engine lock poisoned".to_string()))?;

        let mut page_texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            match engine.recognize_page(page) {
                Ok(detections) => page_texts.push(ocr::page_text(&detections)),
                Err(e) => {
                    warn!(page = index + 1, error = %e, "OCR failed for page");
                    page_texts.push(String::new());
                }
            }
        }

        Ok(page_texts.join("\n"))
    }
}
