//! Cart endpoints. Every line change moves stock with it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::BookId;
use serde::Deserialize;
use store::Store;

use super::parse_id;
use super::responses::CartResponse;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub book_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// GET /cart: the caller's cart, created on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let cart = state.carts.get_or_create(customer_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items: add copies of a book, reserving them.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let book_id: BookId = parse_id(&req.book_id)?;
    let cart = state
        .carts
        .add_item(customer_id, book_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/items/{book_id}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, req))]
pub async fn set_quantity<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(book_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let book_id: BookId = parse_id(&book_id)?;
    let cart = state
        .carts
        .set_item_quantity(customer_id, book_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/{book_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(book_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let book_id: BookId = parse_id(&book_id)?;
    let cart = state.carts.remove_item(customer_id, book_id).await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart: empty the cart and return every held copy to stock.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let cart = state.carts.clear(customer_id).await?;
    Ok(Json(cart.into()))
}
