//! Per-book stock bookkeeping.

use common::BookId;
use domain::{DomainError, StockMoves};
use store::Store;

use crate::error::Result;

/// Atomic stock decrements and increments.
///
/// A reservation is a single conditional write; when it is refused nothing
/// changes and the caller gets `InsufficientStock` with the book title and
/// the quantity that was left. There are no retries.
#[derive(Clone)]
pub struct StockLedger<S: Store> {
    store: S,
}

impl<S: Store> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Takes `quantity` units out of stock. Returns the new stock level.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                book_id,
                quantity: 0,
            }
            .into());
        }

        match self.store.reserve_stock(book_id, quantity).await {
            Ok(stock) => {
                record_moves(StockMoves {
                    reserved: u64::from(quantity),
                    released: 0,
                });
                Ok(stock)
            }
            Err(err) => {
                if let Some(DomainError::InsufficientStock { available, .. }) = err.as_rejection() {
                    metrics::counter!("stock_reservations_rejected_total").increment(1);
                    tracing::info!(%book_id, quantity, available, "reservation refused");
                }
                Err(err.into())
            }
        }
    }

    /// Gives `quantity` units back. Returns the new stock level.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        let stock = self.store.release_stock(book_id, quantity).await?;
        record_moves(StockMoves::released(u64::from(quantity)));
        Ok(stock)
    }
}

/// Counts units taken from and given back to stock. Cart mutations,
/// checkouts and cancellations report what they moved through here.
pub(crate) fn record_moves(moves: StockMoves) {
    if moves.reserved > 0 {
        metrics::counter!("stock_reservations_total").increment(moves.reserved);
    }
    if moves.released > 0 {
        metrics::counter!("stock_releases_total").increment(moves.released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Book, Category, ExpertiseLevel, Money};
    use store::InMemoryStore;

    use crate::error::CheckoutError;

    async fn ledger_with(stock: u32) -> (StockLedger<InMemoryStore>, InMemoryStore, BookId) {
        let store = InMemoryStore::new();
        let book = store
            .insert_book(Book {
                id: BookId::new(),
                title: "Jerusalem".to_string(),
                author: "Yotam Ottolenghi".to_string(),
                price: Money::from_cents(2900),
                stock,
                category: Category::Other,
                expertise: ExpertiseLevel::Intermediate,
                description: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (StockLedger::new(store.clone()), store, book.id)
    }

    #[tokio::test]
    async fn test_reserve_then_release() {
        let (ledger, store, book_id) = ledger_with(5).await;

        assert_eq!(ledger.reserve(book_id, 2).await.unwrap(), 3);
        assert_eq!(ledger.release(book_id, 1).await.unwrap(), 4);
        assert_eq!(store.stock_of(book_id).await, Some(4));
    }

    #[tokio::test]
    async fn test_shortfall_reports_what_is_left() {
        let (ledger, store, book_id) = ledger_with(3).await;

        let err = ledger.reserve(book_id, 4).await.unwrap_err();
        assert!(err.to_string().contains("only 3 left"));
        match err {
            CheckoutError::Domain(DomainError::InsufficientStock {
                requested,
                available,
                title,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
                assert_eq!(title, "Jerusalem");
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(store.stock_of(book_id).await, Some(3));
    }

    #[tokio::test]
    async fn test_zero_quantity_refused() {
        let (ledger, _, book_id) = ledger_with(3).await;
        assert!(matches!(
            ledger.reserve(book_id, 0).await,
            Err(CheckoutError::Domain(DomainError::InvalidQuantity { .. }))
        ));
    }
}
