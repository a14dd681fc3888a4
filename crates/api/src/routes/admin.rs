//! Back-office endpoints for order managers and catalog managers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{BookId, Category, ExpertiseLevel, Money, NewBook, OrderId, OrderStatus};
use serde::Deserialize;
use store::{OrderQuery, Store};

use super::orders::parse_sort;
use super::parse_id;
use super::responses::{BookResponse, OrderPageResponse, OrderResponse};
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new().sort(parse_sort(self.sort)?);
        if let Some(status) = self.status {
            query = query.status(status.parse::<OrderStatus>()?);
        }
        if let Some(from) = self.from {
            query = query.from(from);
        }
        if let Some(to) = self.to {
            query = query.to(to);
        }
        if let Some(page) = self.page {
            query = query.page(page);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        Ok(query)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NewBookRequest {
    pub title: String,
    pub author: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: u32,
    pub category: String,
    pub expertise: String,
    pub description: Option<String>,
}

impl NewBookRequest {
    fn into_new_book(self) -> Result<NewBook, ApiError> {
        Ok(NewBook {
            title: self.title,
            author: self.author,
            price: Money::from_cents(self.price_cents),
            stock: self.stock,
            category: self
                .category
                .parse::<Category>()
                .map_err(ApiError::BadRequest)?,
            expertise: self
                .expertise
                .parse::<ExpertiseLevel>()
                .map_err(ApiError::BadRequest)?,
            description: self.description,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// GET /admin/orders: every order, filtered and paginated.
#[tracing::instrument(skip(state))]
pub async fn list_orders<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<OrderPageResponse>, ApiError> {
    caller.order_manager()?;
    let page = state.orders.list(filter.into_query()?).await?;
    Ok(Json(page.into()))
}

/// GET /admin/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get_order<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.order_manager()?;
    let order_id: OrderId = parse_id(&id)?;
    let order = state.orders.get(order_id).await?;
    Ok(Json(order.into()))
}

/// PUT /admin/orders/{id}/status: set any status; stock is not touched.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.order_manager()?;
    let order_id: OrderId = parse_id(&id)?;
    let order = state.orders.update_status(order_id, &req.status).await?;
    Ok(Json(order.into()))
}

/// POST /admin/books: add a catalog entry.
#[tracing::instrument(skip(state, req))]
pub async fn add_book<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<NewBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    caller.catalog_manager()?;
    let book = state.catalog.add_book(req.into_new_book()?).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// POST /admin/books/{id}/restock
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    caller.catalog_manager()?;
    let book_id: BookId = parse_id(&id)?;
    let book = state.catalog.restock(book_id, req.quantity).await?;
    Ok(Json(book.into()))
}
