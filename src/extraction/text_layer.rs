// Embedded text layer extraction - pure Rust via lopdf
use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::ExtractionError;

/// Concatenation of every page's embedded text layer, pages joined by
/// newline. Returns an empty string when no page carries extractable text.
///
/// A structurally unreadable document is the one failure that must reach the
/// caller; per-page decode problems just leave that page blank.
pub fn extract_text(pdf_path: &Path) -> Result<String, ExtractionError> {
    let document = Document::load(pdf_path)
        .map_err(|e| ExtractionError::SourceUnreadable(e.to_string()))?;

    let mut pages_text = Vec::new();
    for page_number in document.get_pages().keys() {
        let page_text = document.extract_text(&[*page_number]).unwrap_or_default();
        pages_text.push(page_text.trim_end().to_string());
    }

    let text = pages_text.join("\n");
    debug!(
        pages = pages_text.len(),
        chars = text.len(),
        "extracted embedded text layer"
    );
    Ok(text)
}
