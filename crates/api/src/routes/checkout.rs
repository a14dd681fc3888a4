//! Checkout endpoints: initiate, finalize, and transaction lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutItem, CheckoutOutcome, CheckoutRequest, PaymentSession, SessionStatus};
use domain::{BookId, PaymentMethod};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_id;
use super::responses::OrderResponse;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub book_id: String,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitiateRequest {
    /// Omitted means check out the cart.
    pub items: Option<Vec<ItemRequest>>,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub direct: bool,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub transaction_id: String,
    pub items: Option<Vec<ItemRequest>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitiateResponse {
    Redirect {
        transaction_id: String,
        session_id: String,
        redirect_url: String,
        total_cents: i64,
    },
    Order {
        order: OrderResponse,
    },
}

#[derive(Serialize)]
pub struct FinalizeResponse {
    pub order: OrderResponse,
    pub replayed: bool,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub session_id: String,
    pub status: &'static str,
    pub amount_cents: i64,
    pub currency: String,
    pub redirect_url: String,
}

impl From<PaymentSession> for TransactionResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            transaction_id: session.transaction_id,
            session_id: session.id,
            status: match session.status {
                SessionStatus::Open => "open",
                SessionStatus::Complete => "complete",
            },
            amount_cents: session.amount_total.cents(),
            currency: session.currency,
            redirect_url: session.redirect_url,
        }
    }
}

fn parse_items(items: Option<Vec<ItemRequest>>) -> Result<Option<Vec<CheckoutItem>>, ApiError> {
    items
        .map(|items| {
            items
                .into_iter()
                .map(|item| -> Result<CheckoutItem, ApiError> {
                    let book_id: BookId = parse_id(&item.book_id)?;
                    Ok(CheckoutItem {
                        book_id,
                        quantity: item.quantity,
                    })
                })
                .collect()
        })
        .transpose()
}

/// POST /checkout: open a payment session, or place the order directly.
#[tracing::instrument(skip(state, req))]
pub async fn initiate<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<InitiateRequest>,
) -> Result<(StatusCode, Json<InitiateResponse>), ApiError> {
    let customer_id = caller.shopper()?;

    let mut request = CheckoutRequest {
        items: parse_items(req.items)?,
        ..CheckoutRequest::default()
    };
    if let Some(transaction_id) = req.transaction_id {
        request = request.transaction_id(transaction_id);
    }
    if req.direct {
        let method = req
            .payment_method
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        request = request.direct(method);
    }

    let (status, body) = match state.checkout.initiate(customer_id, request).await? {
        CheckoutOutcome::Redirect(session) => (
            StatusCode::OK,
            InitiateResponse::Redirect {
                transaction_id: session.transaction_id,
                session_id: session.session_id,
                redirect_url: session.redirect_url,
                total_cents: session.total.cents(),
            },
        ),
        CheckoutOutcome::Placed(order) => (
            StatusCode::CREATED,
            InitiateResponse::Order {
                order: order.into(),
            },
        ),
    };

    Ok((status, Json(body)))
}

/// POST /checkout/finalize: turn a paid transaction into an order.
///
/// Replays answer 200 with the order the transaction already produced.
#[tracing::instrument(skip(state, req))]
pub async fn finalize<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<FinalizeRequest>,
) -> Result<(StatusCode, Json<FinalizeResponse>), ApiError> {
    let customer_id = caller.shopper()?;
    if req.transaction_id.trim().is_empty() {
        return Err(ApiError::BadRequest("transaction_id is required".to_string()));
    }
    let items = parse_items(req.items)?;

    let finalized = state
        .checkout
        .finalize(customer_id, &req.transaction_id, items)
        .await?;

    let status = if finalized.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(FinalizeResponse {
            order: finalized.order.into(),
            replayed: finalized.replayed,
        }),
    ))
}

/// GET /checkout/transactions/{id}: processor-side session state.
#[tracing::instrument(skip(state))]
pub async fn transaction<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    caller.shopper()?;
    let session = state.checkout.transaction_status(&transaction_id).await?;
    Ok(Json(session.into()))
}
