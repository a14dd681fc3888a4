//! Checkout error types.

use common::OrderId;
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur in the cart, order and checkout services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule refused the request. Nothing was changed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The order does not exist or belongs to someone else.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No payment session is known for the transaction.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// The hosted payment processor failed or refused the session.
    #[error("Payment service error: {0}")]
    UpstreamPayment(String),

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(e) => CheckoutError::Domain(e),
            StoreError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            other => CheckoutError::Store(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
