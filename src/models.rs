// Pipeline output types
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single purchased product recovered from a receipt.
///
/// `quantity` is a whole number for unit-counted items and fractional for
/// weight-counted items (kilograms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// The structured record produced by the extraction pipeline.
///
/// Built once per upload and handed to storage; fields left `None` when the
/// parser could not determine them from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub merchant: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub total_amount: Option<f64>,
    pub items: Vec<LineItem>,
}

impl ExtractedReceipt {
    /// The record produced when nothing at all could be read from the
    /// document. Storage always receives a well-formed record.
    pub fn fallback() -> Self {
        Self {
            merchant: Some("Unknown".to_string()),
            timestamp: Some(chrono::Local::now().naive_local()),
            total_amount: Some(0.0),
            items: Vec::new(),
        }
    }
}
