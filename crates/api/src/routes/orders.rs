//! Customer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::OrderId;
use serde::Deserialize;
use store::{OrderQuery, OrderSort, Store};

use super::parse_id;
use super::responses::{OrderPageResponse, OrderResponse};
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub(crate) fn parse_sort(sort: Option<String>) -> Result<OrderSort, ApiError> {
    sort.map(|s| s.parse::<OrderSort>().map_err(ApiError::BadRequest))
        .transpose()
        .map(Option::unwrap_or_default)
}

/// GET /orders: the caller's order history, newest first by default.
#[tracing::instrument(skip(state))]
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<HistoryParams>,
) -> Result<Json<OrderPageResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let mut query = OrderQuery::new().sort(parse_sort(params.sort)?);
    if let Some(page) = params.page {
        query = query.page(page);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    let page = state.orders.history(customer_id, query).await?;
    Ok(Json(page.into()))
}

/// GET /orders/{id}: one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let order_id: OrderId = parse_id(&id)?;
    let order = state.orders.get_for_customer(customer_id, order_id).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/cancel: cancel and restock a pending or confirmed order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let customer_id = caller.shopper()?;
    let order_id: OrderId = parse_id(&id)?;
    let order = state.orders.cancel(customer_id, order_id).await?;
    Ok(Json(order.into()))
}
