//! Domain model for the Livre Gourmand order service.
//!
//! This crate holds the business rules and nothing else:
//! - `Money` and the catalog `Book`
//! - the `Cart` aggregate, which plans line and stock changes for a store to apply
//! - the `Order` aggregate with its `OrderStatus` state machine and payments
//! - caller `Identity` and `Role` capabilities
//! - the `DomainError` rejection taxonomy

pub mod cart;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod money;
pub mod order;

pub use cart::{
    Cart, CartLine, CartMutation, CartOp, LineChange, LineMutation, Settlement, StockDelta,
    StockMoves,
};
pub use catalog::{Book, Category, ExpertiseLevel, NewBook};
pub use common::{BookId, CartId, CustomerId, OrderId, PaymentId};
pub use error::DomainError;
pub use identity::{Identity, Role};
pub use money::Money;
pub use order::{
    NewOrder, NewPayment, Order, OrderDraft, OrderLine, OrderStatus, Payment, PaymentMethod,
    PaymentStatus,
};
