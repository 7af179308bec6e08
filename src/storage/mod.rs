// Receipt persistence and analytics queries
pub mod analytics;
pub mod sqlite;

pub use sqlite::{
    ProductRow, ReceiptStore, ReceiptSummary, ReceiptUpdate, StoredProduct, StoredReceipt,
};
