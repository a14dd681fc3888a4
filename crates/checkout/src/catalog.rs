//! Catalog reads and back-office stock intake.

use common::BookId;
use domain::{Book, DomainError, NewBook};
use store::{BookQuery, Store};

use crate::error::Result;
use crate::ledger::StockLedger;

#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
    ledger: StockLedger<S>,
}

impl<S: Store + Clone> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            ledger: StockLedger::new(store.clone()),
            store,
        }
    }

    #[tracing::instrument(skip(self, book), fields(title = %book.title))]
    pub async fn add_book(&self, book: NewBook) -> Result<Book> {
        let book = self.store.insert_book(book.into_book()?).await?;
        tracing::info!(book_id = %book.id, stock = book.stock, "book added");
        Ok(book)
    }

    pub async fn get_book(&self, book_id: BookId) -> Result<Book> {
        self.store
            .get_book(book_id)
            .await?
            .ok_or_else(|| DomainError::BookNotFound { book_id }.into())
    }

    pub async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>> {
        Ok(self.store.list_books(query).await?)
    }

    /// Adds delivered units to stock and returns the updated book.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, book_id: BookId, quantity: u32) -> Result<Book> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                book_id,
                quantity: 0,
            }
            .into());
        }
        self.ledger.release(book_id, quantity).await?;
        self.get_book(book_id).await
    }
}
