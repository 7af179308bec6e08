// Configuration constants for recibo
use std::env;
use std::path::PathBuf;

/// OCR detections with confidence at or below this floor are discarded.
pub const OCR_CONFIDENCE_FLOOR: f32 = 0.5;

// Rasterization tiers
pub const RENDER_DPI_PRIMARY: u32 = 200;
pub const RENDER_DPI_REDUCED: u32 = 150;

/// Recognizer input height; strips are scaled to this before inference.
pub const OCR_STRIP_HEIGHT: u32 = 32;

/// Widest strip the recognizer accepts; wider strips are scaled down.
pub const OCR_STRIP_MAX_WIDTH: u32 = 1024;

// Get OCR model directory from environment or use default
pub fn model_dir() -> PathBuf {
    env::var("RECIBO_MODEL_DIR")
        .unwrap_or_else(|_| "models".to_string())
        .into()
}
