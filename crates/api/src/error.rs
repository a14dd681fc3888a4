//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;
use serde_json::{Map, Value, json};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No usable identity on the request.
    Unauthorized(String),
    /// The caller's role does not allow this.
    Forbidden(String),
    /// Service-layer error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, Map::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, Map::new()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, Map::new())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, Map::new()),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    msg,
                    Map::new(),
                )
            }
        };

        let mut body = details;
        body.insert("error".to_string(), Value::String(message));
        body.insert("code".to_string(), Value::String(code.to_string()));
        (status, axum::Json(Value::Object(body))).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, &'static str, String, Map<String, Value>) {
    let message = err.to_string();
    match err {
        CheckoutError::Domain(domain_err) => {
            let status = match &domain_err {
                DomainError::BookNotFound { .. } | DomainError::ItemNotInCart { .. } => {
                    StatusCode::NOT_FOUND
                }
                DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
                DomainError::InvalidQuantity { .. }
                | DomainError::InsufficientStock { .. }
                | DomainError::InvalidStatus { .. }
                | DomainError::EmptyCheckout
                | DomainError::InvalidBook { .. } => StatusCode::BAD_REQUEST,
            };
            (status, domain_err.code(), message, domain_details(&domain_err))
        }
        CheckoutError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", message, Map::new())
        }
        CheckoutError::TransactionNotFound(_) => (
            StatusCode::NOT_FOUND,
            "TRANSACTION_NOT_FOUND",
            message,
            Map::new(),
        ),
        CheckoutError::UpstreamPayment(_) => {
            tracing::warn!(error = %message, "payment processor failure");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_PAYMENT", message, Map::new())
        }
        CheckoutError::Store(StoreError::ConcurrencyConflict(_)) => (
            StatusCode::CONFLICT,
            "CONCURRENCY_CONFLICT",
            message,
            Map::new(),
        ),
        CheckoutError::Store(_) => {
            tracing::error!(error = %message, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Internal server error".to_string(),
                Map::new(),
            )
        }
    }
}

/// Per-line detail so clients can point at the offending item.
fn domain_details(err: &DomainError) -> Map<String, Value> {
    let details = match err {
        DomainError::InsufficientStock {
            book_id,
            title,
            requested,
            available,
        } => json!({
            "book_id": book_id,
            "title": title,
            "requested": requested,
            "available": available,
        }),
        DomainError::InvalidQuantity { book_id, quantity } => json!({
            "book_id": book_id,
            "quantity": quantity,
        }),
        DomainError::InvalidTransition { order_id, from, to } => json!({
            "order_id": order_id,
            "from": from,
            "to": to,
        }),
        DomainError::InvalidStatus { value } => json!({ "value": value }),
        other => match other.book_id() {
            Some(book_id) => json!({ "book_id": book_id }),
            None => json!({}),
        },
    };
    match details {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Checkout(CheckoutError::Domain(err))
    }
}
