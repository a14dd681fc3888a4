//! HTTP API for the Livre Gourmand storefront.
//!
//! Serves the catalog, carts, checkout and order history, plus the back
//! office, with structured logging (tracing) and Prometheus metrics.
//! Callers are identified by the `x-customer-id` and `x-role` headers.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/books", get(routes::books::list::<S>))
        .route("/books/{id}", get(routes::books::get::<S>))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{book_id}",
            put(routes::cart::set_quantity::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/checkout", post(routes::checkout::initiate::<S>))
        .route("/checkout/finalize", post(routes::checkout::finalize::<S>))
        .route(
            "/checkout/transactions/{id}",
            get(routes::checkout::transaction::<S>),
        )
        .route("/orders", get(routes::orders::history::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        .route("/admin/orders", get(routes::admin::list_orders::<S>))
        .route("/admin/orders/{id}", get(routes::admin::get_order::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::admin::update_status::<S>),
        )
        .route("/admin/books", post(routes::admin::add_book::<S>))
        .route(
            "/admin/books/{id}/restock",
            post(routes::admin::restock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
