// Receipt extraction pipeline
pub mod fields;
pub mod line_items;
pub mod ocr;
pub mod orchestrator;
pub mod rasterizer;
pub mod text_layer;

pub use ocr::{OcrDetection, OcrEngine};
pub use orchestrator::{ExtractionPipeline, SharedOcrEngine};

/// Parse a monetary or quantity figure, accepting either decimal separator.
/// Receipts in the calibrated locales print "12,50" where "12.50" is meant.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}
