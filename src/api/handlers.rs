// Request handlers - upload, receipt/product CRUD, analytics
use std::io::Write;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::ExtractionError;
use crate::storage::analytics::{BasketEntry, TrendPeriod};
use crate::storage::ReceiptUpdate;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> Response {
    error!("{context}: {err}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {err}"),
    )
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Accept a PDF upload, run the extraction pipeline, persist the result.
///
/// Partial extraction is still a created receipt; the only client errors
/// are a missing or non-PDF upload and a structurally unreadable document.
pub async fn upload_receipt(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut payload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("receipt") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or("receipt.pdf").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        payload = Some((file_name, bytes.to_vec()));
                        break;
                    }
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("could not read upload: {e}"),
                        )
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("malformed multipart body: {e}"),
                )
            }
        }
    }

    let Some((file_name, bytes)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "no file uploaded under 'receipt'");
    };
    if !file_name.to_lowercase().ends_with(".pdf") {
        warn!(file_name, "rejected non-PDF upload");
        return error_response(StatusCode::BAD_REQUEST, "only PDF files are accepted");
    }
    info!(file_name, size = bytes.len(), "processing uploaded receipt");

    let pipeline = state.pipeline.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        // The upload lives in a scratch file for the duration of the
        // request; dropping the handle removes it on every exit path.
        let mut temp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        temp.write_all(&bytes)?;
        temp.flush()?;
        pipeline.extract(temp.path())
    })
    .await;

    let record = match extraction {
        Ok(Ok(record)) => record,
        Ok(Err(ExtractionError::SourceUnreadable(reason))) => {
            warn!(reason, "upload was not a readable PDF");
            return error_response(StatusCode::BAD_REQUEST, "could not process the PDF");
        }
        Ok(Err(e)) => return internal_error("extraction failed", e),
        Err(e) => return internal_error("extraction task panicked", e),
    };

    let stored = {
        let mut store = match state.store.lock() {
            Ok(store) => store,
            Err(e) => return internal_error("store lock poisoned", e),
        };
        match store.insert_receipt(&record) {
            Ok(stored) => stored,
            Err(e) => return internal_error("could not persist receipt", e),
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "receipt processed successfully",
            "receipt": stored,
        })),
    )
        .into_response()
}

pub async fn list_receipts(State(state): State<AppState>) -> Response {
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.list_receipts() {
        Ok(receipts) => Json(json!({
            "success": true,
            "total_count": receipts.len(),
            "receipts": receipts,
        }))
        .into_response(),
        Err(e) => internal_error("could not list receipts", e),
    }
}

pub async fn receipt_detail(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.get_receipt(id) {
        Ok(Some(receipt)) => {
            Json(json!({ "success": true, "receipt": receipt })).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "receipt not found"),
        Err(e) => internal_error("could not load receipt", e),
    }
}

pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ReceiptUpdate>,
) -> Response {
    if let Some(date) = &update.date {
        if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid date format (use YYYY-MM-DD)",
            );
        }
    }

    let mut store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.update_receipt(id, &update) {
        Ok(Some(receipt)) => Json(json!({
            "success": true,
            "message": "receipt updated successfully",
            "receipt": receipt,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "receipt not found"),
        Err(e) => internal_error("could not update receipt", e),
    }
}

pub async fn delete_receipt(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let mut store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.delete_receipt(id) {
        Ok(Some(receipt)) => Json(json!({
            "success": true,
            "message": format!(
                "receipt {} deleted along with {} products",
                id, receipt.products_count
            ),
            "deleted_receipt": receipt,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "receipt not found"),
        Err(e) => internal_error("could not delete receipt", e),
    }
}

pub async fn list_products(State(state): State<AppState>) -> Response {
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.list_products() {
        Ok(products) => Json(json!({
            "success": true,
            "count": products.len(),
            "products": products,
        }))
        .into_response(),
        Err(e) => internal_error("could not list products", e),
    }
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let mut store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.delete_product(id) {
        Ok(Some(receipt_id)) => Json(json!({
            "success": true,
            "message": format!("product {id} deleted successfully"),
            "receipt_id": receipt_id,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "product not found"),
        Err(e) => internal_error("could not delete product", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub period: Option<String>,
}

pub async fn spending_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Response {
    let period = match query.period.as_deref().unwrap_or("monthly") {
        "monthly" => TrendPeriod::Monthly,
        "weekly" => TrendPeriod::Weekly,
        "yearly" => TrendPeriod::Yearly,
        other => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid period '{other}'; use monthly, weekly or yearly"),
            )
        }
    };

    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.spending_trend(period) {
        Ok(trend) => wrap_success(trend),
        Err(e) => internal_error("could not compute spending trend", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub product_name: Option<String>,
}

pub async fn compare_prices(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Response {
    let Some(product_name) = query.product_name.filter(|n| !n.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "product_name parameter is required");
    };

    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.compare_prices(&product_name) {
        Ok(comparison) => wrap_success(comparison),
        Err(e) => internal_error("could not compare prices", e),
    }
}

pub async fn top_products(State(state): State<AppState>) -> Response {
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.top_products() {
        Ok(top) => wrap_success(top),
        Err(e) => internal_error("could not compute top products", e),
    }
}

pub async fn price_changes(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Response {
    let Some(product_name) = query.product_name.filter(|n| !n.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "product_name parameter is required");
    };

    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.price_changes(&product_name) {
        Ok(changes) => wrap_success(changes),
        Err(e) => internal_error("could not compute price changes", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct BasketRequest {
    #[serde(default)]
    pub products: Vec<BasketEntry>,
}

pub async fn cheapest_basket(
    State(state): State<AppState>,
    Json(request): Json<BasketRequest>,
) -> Response {
    if request.products.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "product list is empty");
    }

    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.cheapest_basket(&request.products) {
        Ok(basket) => wrap_success(basket),
        Err(e) => internal_error("could not compute cheapest basket", e),
    }
}

pub async fn supermarket_ranking(State(state): State<AppState>) -> Response {
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(e) => return internal_error("store lock poisoned", e),
    };
    match store.supermarket_ranking() {
        Ok(ranking) => wrap_success(ranking),
        Err(e) => internal_error("could not compute ranking", e),
    }
}

fn wrap_success<T: Serialize>(body: T) -> Response {
    match serde_json::to_value(&body) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.insert("success".to_string(), json!(true));
            Json(serde_json::Value::Object(map)).into_response()
        }
        Ok(value) => Json(value).into_response(),
        Err(e) => internal_error("could not serialize response", e),
    }
}
