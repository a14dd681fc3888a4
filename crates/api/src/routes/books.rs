//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{BookId, Category, ExpertiseLevel};
use serde::Deserialize;
use store::{BookQuery, Store};

use super::parse_id;
use super::responses::BookResponse;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BookFilter {
    pub category: Option<String>,
    pub expertise: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl BookFilter {
    fn into_query(self) -> Result<BookQuery, ApiError> {
        let mut query = BookQuery::new();
        if let Some(category) = self.category {
            query = query.category(category.parse::<Category>().map_err(ApiError::BadRequest)?);
        }
        if let Some(expertise) = self.expertise {
            query = query.expertise(
                expertise
                    .parse::<ExpertiseLevel>()
                    .map_err(ApiError::BadRequest)?,
            );
        }
        if let Some(search) = self.search {
            query = query.search(search);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        Ok(query)
    }
}

/// GET /books: browse the catalog.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = state.catalog.list_books(filter.into_query()?).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /books/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, ApiError> {
    let book_id: BookId = parse_id(&id)?;
    let book = state.catalog.get_book(book_id).await?;
    Ok(Json(book.into()))
}
