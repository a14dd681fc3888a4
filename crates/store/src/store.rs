use async_trait::async_trait;
use common::{BookId, CustomerId, OrderId};
use domain::{Book, Cart, CartOp, NewOrder, NewPayment, Order, OrderStatus, Payment, StockMoves};

use crate::{BookQuery, OrderPage, OrderQuery, Result};

/// A cart after a mutation, with the stock the mutation moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpdate {
    pub cart: Cart,
    pub moves: StockMoves,
}

/// A stored order, with the stock taken for it and the cart units released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub order: Order,
    pub moves: StockMoves,
}

/// Persistence for the catalog, carts and orders.
///
/// Every method that touches more than one row is atomic: either all of its
/// writes are visible afterwards or none are. Stock is only ever taken with a
/// conditional check-and-write, so it never goes below zero.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Adds a book to the catalog.
    async fn insert_book(&self, book: Book) -> Result<Book>;

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// Lists books matching the query, ordered by title.
    async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>>;

    /// Takes `quantity` units out of stock if at least that many are left.
    ///
    /// Returns the new stock level, or `InsufficientStock` with nothing
    /// changed.
    async fn reserve_stock(&self, book_id: BookId, quantity: u32) -> Result<u32>;

    /// Gives `quantity` units back to stock. Returns the new stock level.
    ///
    /// A release that would lift stock past `u32::MAX` is refused with
    /// `InvalidQuantity` and nothing is written.
    async fn release_stock(&self, book_id: BookId, quantity: u32) -> Result<u32>;

    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>>;

    /// Returns the customer's cart, creating an empty one on first use.
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart>;

    /// Applies a cart operation together with its stock movement.
    ///
    /// The cart and the targeted book are read inside the same unit of work,
    /// the change is planned by [`Cart::plan`], and the line and stock
    /// changes are written together. A refused reservation leaves the cart
    /// untouched. Book rows are written in book id order.
    async fn mutate_cart(&self, customer_id: CustomerId, op: CartOp) -> Result<CartUpdate>;

    /// Persists an order and takes its stock.
    ///
    /// Units already reserved by the customer's cart are consumed, only the
    /// remainder is taken from stock, cart units the order does not use are
    /// released, and the cart is emptied. Fails with `DuplicateTransaction`
    /// if the transaction id already belongs to an order. Draws and releases
    /// are written together in book id order.
    async fn place_order(&self, order: NewOrder) -> Result<Placement>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<Order>>;

    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage>;

    /// Cancels an order and returns its units to stock.
    ///
    /// With `customer_id` set, an order placed by someone else is reported as
    /// not found.
    async fn cancel_order(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
    ) -> Result<Order>;

    /// Overwrites the status without any transition guard or stock movement.
    async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Attaches a payment to an existing order.
    async fn record_payment(&self, order_id: OrderId, payment: NewPayment) -> Result<Payment>;
}
