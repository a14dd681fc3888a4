//! Services for the cookbook storefront's order flow.
//!
//! - [`StockLedger`]: single-book reserve and release, and the stock movement counters
//! - [`CartService`]: cart mutations that move stock with every line change
//! - [`CheckoutOrchestrator`]: items to payment session to order, idempotent
//!   on the client-held transaction id
//! - [`OrderService`]: history, customer cancellation, back-office status
//! - [`CatalogService`]: catalog reads and restocking
//!
//! The hosted payment processor sits behind [`PaymentGateway`].

pub mod cart;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod orders;
pub mod payment;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use error::{CheckoutError, Result};
pub use ledger::StockLedger;
pub use orchestrator::{
    CheckoutItem, CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, CheckoutSession,
    CheckoutSettings, Finalized,
};
pub use orders::OrderService;
pub use payment::{
    InMemoryPaymentGateway, PaymentGateway, PaymentSession, SessionLineItem, SessionRequest,
    SessionStatus,
};
