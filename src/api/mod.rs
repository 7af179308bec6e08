// HTTP surface for uploads, CRUD and analytics
pub mod handlers;

use std::sync::{Arc, Mutex};

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::extraction::ExtractionPipeline;
use crate::storage::ReceiptStore;

/// Shared state: one store connection and one pipeline (which itself holds
/// the process-wide OCR engine).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ReceiptStore>>,
    pub pipeline: Arc<ExtractionPipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/receipts/upload/", post(handlers::upload_receipt))
        .route("/api/receipts/", get(handlers::list_receipts))
        .route(
            "/api/receipts/:id/",
            get(handlers::receipt_detail)
                .put(handlers::update_receipt)
                .patch(handlers::update_receipt)
                .delete(handlers::delete_receipt),
        )
        .route("/api/products/", get(handlers::list_products))
        .route("/api/products/:id/", delete(handlers::delete_product))
        .route(
            "/api/analytics/spending-trend/",
            get(handlers::spending_trend),
        )
        .route(
            "/api/analytics/compare-prices/",
            get(handlers::compare_prices),
        )
        .route("/api/analytics/top-products/", get(handlers::top_products))
        .route(
            "/api/analytics/price-changes/",
            get(handlers::price_changes),
        )
        .route(
            "/api/analytics/cheapest-basket/",
            post(handlers::cheapest_basket),
        )
        .route(
            "/api/analytics/supermarket-ranking/",
            get(handlers::supermarket_ranking),
        )
        .layer(ServiceBuilder::new())
        .with_state(state)
}
