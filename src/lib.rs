// recibo - grocery receipt extraction pipeline and service
pub mod api;
pub mod config;
pub mod error;
pub mod extraction;
pub mod models;
pub mod storage;

pub use error::ExtractionError;
pub use extraction::{ExtractionPipeline, OcrEngine, SharedOcrEngine};
pub use models::{ExtractedReceipt, LineItem};
pub use storage::ReceiptStore;
