//! Shared application state.

use std::sync::Arc;

use checkout::{
    CartService, CatalogService, CheckoutOrchestrator, CheckoutSettings, InMemoryPaymentGateway,
    OrderService,
};
use store::Store;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub checkout: CheckoutOrchestrator<S, InMemoryPaymentGateway>,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, gateway: InMemoryPaymentGateway, settings: CheckoutSettings) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            checkout: CheckoutOrchestrator::new(store, gateway, settings),
        }
    }
}

/// Creates the default application state over `store`, with the in-process
/// payment gateway.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let gateway = InMemoryPaymentGateway::new(config.payment_checkout_url.clone());
    let settings = CheckoutSettings::new(config.frontend_url.clone());
    Arc::new(AppState::new(store, gateway, settings))
}
