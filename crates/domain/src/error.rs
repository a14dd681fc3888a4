//! Business rule rejections.

use common::{BookId, OrderId};
use thiserror::Error;

use crate::order::OrderStatus;

/// Reasons an operation is refused by the domain.
///
/// Every variant carries enough context for the caller to render a
/// per-line-item message. None of these are transient; retrying the same
/// request yields the same answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The referenced book does not exist in the catalog.
    #[error("Book not found: {book_id}")]
    BookNotFound { book_id: BookId },

    /// A line quantity is not a positive integer.
    #[error("Invalid quantity {quantity} for book {book_id}: must be a positive integer")]
    InvalidQuantity { book_id: BookId, quantity: i64 },

    /// Not enough stock to satisfy a reservation.
    #[error("Insufficient stock for \"{title}\": requested {requested}, only {available} left")]
    InsufficientStock {
        book_id: BookId,
        title: String,
        requested: u32,
        available: u32,
    },

    /// The order state machine refuses the transition.
    #[error("Invalid transition for order {order_id}: cannot go from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The status value is not one of the defined order states.
    #[error("Invalid order status: {value}")]
    InvalidStatus { value: String },

    /// The cart holds no line for the book.
    #[error("Book {book_id} is not in the cart")]
    ItemNotInCart { book_id: BookId },

    /// A checkout was requested with no items.
    #[error("Checkout requires at least one item")]
    EmptyCheckout,

    /// A catalog entry failed validation.
    #[error("Invalid book: {reason}")]
    InvalidBook { reason: String },
}

impl DomainError {
    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::BookNotFound { .. } => "BOOK_NOT_FOUND",
            DomainError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::InvalidStatus { .. } => "INVALID_STATUS",
            DomainError::ItemNotInCart { .. } => "ITEM_NOT_IN_CART",
            DomainError::EmptyCheckout => "EMPTY_CHECKOUT",
            DomainError::InvalidBook { .. } => "INVALID_BOOK",
        }
    }

    /// Book the rejection is about, when it concerns a single line.
    pub fn book_id(&self) -> Option<BookId> {
        match self {
            DomainError::BookNotFound { book_id }
            | DomainError::InvalidQuantity { book_id, .. }
            | DomainError::InsufficientStock { book_id, .. }
            | DomainError::ItemNotInCart { book_id } => Some(*book_id),
            _ => None,
        }
    }
}
