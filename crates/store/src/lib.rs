//! Storage for the order service.
//!
//! [`Store`] is implemented by [`InMemoryStore`] for tests and local runs,
//! and by [`PostgresStore`] where stock is guarded by conditional updates and
//! transaction ids by a unique constraint.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{BookQuery, OrderPage, OrderQuery, OrderSort};
pub use store::{CartUpdate, Placement, Store};
