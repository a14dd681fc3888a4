use common::OrderId;
use domain::DomainError;
use thiserror::Error;

/// Errors returned by a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation was refused by a business rule. Nothing was written.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    /// An order already exists for this checkout transaction.
    #[error("Transaction {transaction_id} already produced an order")]
    DuplicateTransaction { transaction_id: String },

    /// The order does not exist, or is not visible to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The database aborted the transaction because of a concurrent writer.
    #[error("Concurrent update conflict: {0}")]
    ConcurrencyConflict(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns the business rejection, if this is one.
    pub fn as_rejection(&self) -> Option<&DomainError> {
        match self {
            StoreError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
