//! Identifier types shared by every layer of the storefront.

pub mod types;

pub use types::{BookId, CartId, CustomerId, OrderId, PaymentId};
