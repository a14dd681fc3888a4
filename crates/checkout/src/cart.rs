//! Customer cart operations.

use common::{BookId, CustomerId};
use domain::{Cart, CartOp, DomainError};
use store::Store;

use crate::error::{CheckoutError, Result};
use crate::ledger::record_moves;

/// Cart mutations. Each one moves stock and cart lines together through the
/// store, so stock plus cart-reserved units stays constant.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_or_create(&self, customer_id: CustomerId) -> Result<Cart> {
        Ok(self.store.get_or_create_cart(customer_id).await?)
    }

    /// Adds units of a book, reserving them first.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        book_id: BookId,
        quantity: i64,
    ) -> Result<Cart> {
        self.apply(customer_id, CartOp::Add { book_id, quantity }, "add")
            .await
    }

    /// Sets a line to `quantity`, reserving or releasing the difference.
    /// Zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn set_item_quantity(
        &self,
        customer_id: CustomerId,
        book_id: BookId,
        quantity: i64,
    ) -> Result<Cart> {
        self.apply(customer_id, CartOp::SetQuantity { book_id, quantity }, "set")
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, customer_id: CustomerId, book_id: BookId) -> Result<Cart> {
        self.apply(customer_id, CartOp::Remove { book_id }, "remove")
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, customer_id: CustomerId) -> Result<Cart> {
        self.apply(customer_id, CartOp::Clear, "clear").await
    }

    async fn apply(&self, customer_id: CustomerId, op: CartOp, label: &'static str) -> Result<Cart> {
        match self.store.mutate_cart(customer_id, op).await {
            Ok(update) => {
                metrics::counter!("cart_mutations_total", "op" => label).increment(1);
                record_moves(update.moves);
                Ok(update.cart)
            }
            Err(err) => {
                let err = CheckoutError::from(err);
                if let CheckoutError::Domain(DomainError::InsufficientStock { .. }) = &err {
                    metrics::counter!("stock_reservations_rejected_total").increment(1);
                }
                tracing::debug!(error = %err, op = label, "cart mutation refused");
                Err(err)
            }
        }
    }
}
