use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, CustomerId, OrderId, PaymentId};
use domain::{
    Book, Cart, CartOp, DomainError, NewOrder, NewPayment, Order, OrderStatus, Payment,
    Settlement, StockDelta,
};
use tokio::sync::RwLock;

use crate::{
    BookQuery, CartUpdate, OrderPage, OrderQuery, Placement, Result, Store, StoreError,
};

#[derive(Default)]
struct State {
    books: HashMap<BookId, Book>,
    carts: HashMap<CustomerId, Cart>,
    orders: HashMap<OrderId, Order>,
    transactions: HashMap<String, OrderId>,
}

impl State {
    fn book(&self, book_id: BookId) -> Result<&Book> {
        self.books
            .get(&book_id)
            .ok_or(StoreError::Rejected(DomainError::BookNotFound { book_id }))
    }

    /// Checks that `quantity` can be taken, reporting `covered` units the
    /// caller already holds as part of the request.
    fn check_stock(&self, book_id: BookId, quantity: u32, covered: u32) -> Result<()> {
        let book = self.book(book_id)?;
        if book.has_stock_for(quantity) {
            Ok(())
        } else {
            Err(book
                .insufficient(quantity + covered, book.stock + covered)
                .into())
        }
    }

    fn take(&mut self, book_id: BookId, quantity: u32) -> Result<u32> {
        self.check_stock(book_id, quantity, 0)?;
        let book = self
            .books
            .get_mut(&book_id)
            .ok_or(StoreError::Rejected(DomainError::BookNotFound { book_id }))?;
        book.stock -= quantity;
        Ok(book.stock)
    }

    /// Checks that `quantity` units can go back without overflowing stock.
    fn check_room(&self, book_id: BookId, quantity: u32) -> Result<()> {
        match self.book(book_id)?.stock.checked_add(quantity) {
            Some(_) => Ok(()),
            None => Err(DomainError::InvalidQuantity {
                book_id,
                quantity: i64::from(quantity),
            }
            .into()),
        }
    }

    fn give_back(&mut self, book_id: BookId, quantity: u32) -> Result<u32> {
        self.check_room(book_id, quantity)?;
        let book = self
            .books
            .get_mut(&book_id)
            .ok_or(StoreError::Rejected(DomainError::BookNotFound { book_id }))?;
        book.stock += quantity;
        Ok(book.stock)
    }

    /// Validates every delta before any of them is applied.
    fn check_deltas(
        &self,
        deltas: &[(BookId, StockDelta)],
        covered: impl Fn(BookId) -> u32,
    ) -> Result<()> {
        for (book_id, delta) in deltas {
            match *delta {
                StockDelta::Reserve(n) => self.check_stock(*book_id, n, covered(*book_id))?,
                StockDelta::Release(n) => self.check_room(*book_id, n)?,
                StockDelta::None => {}
            }
        }
        Ok(())
    }

    fn apply_deltas(&mut self, deltas: &[(BookId, StockDelta)]) -> Result<()> {
        for (book_id, delta) in deltas {
            match *delta {
                StockDelta::Reserve(n) => {
                    self.take(*book_id, n)?;
                }
                StockDelta::Release(n) => {
                    self.give_back(*book_id, n)?;
                }
                StockDelta::None => {}
            }
        }
        Ok(())
    }
}

/// In-memory store for tests and local runs.
///
/// All state sits behind one lock, so every operation is a single critical
/// section and multi-row changes are atomic like a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current stock of a book.
    pub async fn stock_of(&self, book_id: BookId) -> Option<u32> {
        self.state.read().await.books.get(&book_id).map(|b| b.stock)
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all books, carts and orders.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_book(&self, book: Book) -> Result<Book> {
        self.state
            .write()
            .await
            .books
            .insert(book.id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.get(&book_id).cloned())
    }

    async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>> {
        let state = self.state.read().await;
        let needle = query.needle();

        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| query.category.is_none_or(|c| b.category == c))
            .filter(|b| query.expertise.is_none_or(|e| b.expertise == e))
            .filter(|b| {
                needle.as_deref().is_none_or(|n| {
                    b.title.to_lowercase().contains(n) || b.author.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(books.into_iter().skip(offset).take(limit).collect())
    }

    async fn reserve_stock(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        self.state.write().await.take(book_id, quantity)
    }

    async fn release_stock(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        self.state.write().await.give_back(book_id, quantity)
    }

    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&customer_id).cloned())
    }

    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        let mut state = self.state.write().await;
        Ok(state
            .carts
            .entry(customer_id)
            .or_insert_with(|| Cart::new(customer_id))
            .clone())
    }

    async fn mutate_cart(&self, customer_id: CustomerId, op: CartOp) -> Result<CartUpdate> {
        let mut state = self.state.write().await;

        let mut cart = state
            .carts
            .get(&customer_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(customer_id));
        let book = op.book_id().and_then(|id| state.books.get(&id)).cloned();
        let mutation = cart.plan(op, book.as_ref())?;

        let deltas = mutation.stock_deltas();
        state.check_deltas(&deltas, |book_id| match op {
            CartOp::SetQuantity { .. } => cart.reserved_for(book_id),
            _ => 0,
        })?;
        state.apply_deltas(&deltas)?;

        cart.apply(&mutation);
        state.carts.insert(customer_id, cart.clone());
        Ok(CartUpdate {
            cart,
            moves: mutation.moves(),
        })
    }

    async fn place_order(&self, order: NewOrder) -> Result<Placement> {
        let mut state = self.state.write().await;

        if let Some(transaction_id) = &order.transaction_id
            && state.transactions.contains_key(transaction_id)
        {
            return Err(StoreError::DuplicateTransaction {
                transaction_id: transaction_id.clone(),
            });
        }

        let settlement = match order.customer_id.and_then(|c| state.carts.get(&c)) {
            Some(cart) => cart.settle(&order.lines),
            None => Settlement::uncovered(&order.lines),
        };

        let deltas = settlement.stock_deltas();
        state.check_deltas(&deltas, |book_id| settlement.consumed_for(book_id))?;
        state.apply_deltas(&deltas)?;
        if let Some(cart) = order.customer_id.and_then(|c| state.carts.get_mut(&c)) {
            cart.empty();
        }

        let order = order.into_order();
        if let Some(transaction_id) = &order.transaction_id {
            state.transactions.insert(transaction_id.clone(), order.id);
        }
        state.orders.insert(order.id, order.clone());
        Ok(Placement {
            order,
            moves: settlement.moves(),
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .get(transaction_id)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        let state = self.state.read().await;

        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        query.sort.sort(&mut orders);

        let total = orders.len() as u64;
        let page = orders
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.effective_limit() as usize)
            .collect();
        Ok(query.page_of(page, total))
    }

    async fn cancel_order(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
    ) -> Result<Order> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut order = state
            .orders
            .get(&order_id)
            .filter(|o| customer_id.is_none_or(|c| o.belongs_to(c)))
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let mut returns = order.cancel()?;
        returns.sort_by_key(|(book_id, _)| *book_id);

        let deltas: Vec<_> = returns
            .into_iter()
            .map(|(book_id, n)| (book_id, StockDelta::Release(n)))
            .collect();
        state.check_deltas(&deltas, |_| 0)?;
        state.apply_deltas(&deltas)?;

        state.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = status;
        Ok(order.clone())
    }

    async fn record_payment(&self, order_id: OrderId, payment: NewPayment) -> Result<Payment> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let payment = Payment {
            id: PaymentId::new(),
            order_id,
            method: payment.method,
            reference: payment.reference,
            status: payment.status,
            amount: order.total,
            paid_at: Utc::now(),
        };
        order.payments.push(payment.clone());
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Category, ExpertiseLevel, Money, NewPayment, PaymentMethod};

    fn book(title: &str, stock: u32, price_cents: i64) -> Book {
        Book {
            id: BookId::new(),
            title: title.to_string(),
            author: "Julia Child".to_string(),
            price: Money::from_cents(price_cents),
            stock,
            category: Category::French,
            expertise: ExpertiseLevel::Beginner,
            description: None,
            created_at: Utc::now(),
        }
    }

    async fn store_with(stock: u32) -> (InMemoryStore, Book) {
        let store = InMemoryStore::new();
        let b = store.insert_book(book("Mastering the Art", stock, 2450)).await.unwrap();
        (store, b)
    }

    fn add(book_id: BookId, quantity: i64) -> CartOp {
        CartOp::Add { book_id, quantity }
    }

    fn set(book_id: BookId, quantity: i64) -> CartOp {
        CartOp::SetQuantity { book_id, quantity }
    }

    fn confirmed(customer: CustomerId, b: &Book, quantity: u32, tx: &str) -> NewOrder {
        NewOrder::draft(Some(customer))
            .line(b, quantity)
            .status(OrderStatus::Confirmed)
            .transaction_id(Some(tx.to_string()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_is_conditional() {
        let (store, b) = store_with(3).await;

        assert_eq!(store.reserve_stock(b.id, 2).await.unwrap(), 1);

        let err = store.reserve_stock(b.id, 2).await.unwrap_err();
        match err {
            StoreError::Rejected(DomainError::InsufficientStock {
                requested,
                available,
                title,
                ..
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
                assert_eq!(title, "Mastering the Art");
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(store.stock_of(b.id).await, Some(1));
    }

    #[tokio::test]
    async fn test_reserve_unknown_book() {
        let store = InMemoryStore::new();
        let err = store.reserve_stock(BookId::new(), 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(DomainError::BookNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_adds_back() {
        let (store, b) = store_with(0).await;
        assert_eq!(store.release_stock(b.id, 4).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_release_past_max_stock_is_refused() {
        let (store, b) = store_with(u32::MAX - 2).await;

        let err = store.release_stock(b.id, 5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(DomainError::InvalidQuantity { quantity: 5, .. })
        ));
        assert_eq!(store.stock_of(b.id).await, Some(u32::MAX - 2));
        assert_eq!(store.release_stock(b.id, 2).await.unwrap(), u32::MAX);
    }

    #[tokio::test]
    async fn test_cancel_that_would_overflow_stock_changes_nothing() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();
        let order = store
            .place_order(confirmed(customer, &b, 2, "tx-o"))
            .await
            .unwrap()
            .order;
        store.release_stock(b.id, u32::MAX - 4).await.unwrap();

        let err = store.cancel_order(order.id, Some(customer)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(DomainError::InvalidQuantity { .. })
        ));
        assert_eq!(store.stock_of(b.id).await, Some(u32::MAX - 1));
        let order = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cart_mutations_move_stock() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();

        let update = store.mutate_cart(customer, add(b.id, 3)).await.unwrap();
        let cart = update.cart;
        assert_eq!(update.moves.reserved, 3);
        assert_eq!(cart.reserved_for(b.id), 3);
        assert_eq!(cart.total(), Money::from_cents(7350));
        assert_eq!(store.stock_of(b.id).await, Some(2));

        store.mutate_cart(customer, set(b.id, 5)).await.unwrap();
        assert_eq!(store.stock_of(b.id).await, Some(0));

        let update = store.mutate_cart(customer, set(b.id, 1)).await.unwrap();
        assert_eq!(update.moves.released, 4);
        assert_eq!(store.stock_of(b.id).await, Some(4));

        let update = store.mutate_cart(customer, CartOp::Clear).await.unwrap();
        assert!(update.cart.is_empty());
        assert_eq!(update.moves.released, 1);
        assert_eq!(store.stock_of(b.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_refused_reservation_leaves_cart_untouched() {
        let (store, b) = store_with(2).await;
        let customer = CustomerId::new();
        store.mutate_cart(customer, add(b.id, 1)).await.unwrap();

        let err = store.mutate_cart(customer, set(b.id, 4)).await.unwrap_err();
        match err {
            StoreError::Rejected(DomainError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        let cart = store.find_cart(customer).await.unwrap().unwrap();
        assert_eq!(cart.reserved_for(b.id), 1);
        assert_eq!(store.stock_of(b.id).await, Some(1));
    }

    #[tokio::test]
    async fn test_place_order_consumes_cart_reservation() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();
        store.mutate_cart(customer, add(b.id, 3)).await.unwrap();
        store.mutate_cart(customer, set(b.id, 5)).await.unwrap();
        store.mutate_cart(customer, set(b.id, 1)).await.unwrap();

        let order = store
            .place_order(confirmed(customer, &b, 1, "tx1"))
            .await
            .unwrap()
            .order;

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(store.stock_of(b.id).await, Some(4));
        assert!(store.find_cart(customer).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_place_order_draws_excess_and_returns_leftovers() {
        let store = InMemoryStore::new();
        let a = store.insert_book(book("A", 10, 1000)).await.unwrap();
        let c = store.insert_book(book("C", 10, 500)).await.unwrap();
        let customer = CustomerId::new();
        store.mutate_cart(customer, add(a.id, 2)).await.unwrap();
        store.mutate_cart(customer, add(c.id, 3)).await.unwrap();

        let order = NewOrder::draft(Some(customer))
            .line(&a, 5)
            .status(OrderStatus::Confirmed)
            .build()
            .unwrap();
        let placement = store.place_order(order).await.unwrap();

        assert_eq!(store.stock_of(a.id).await, Some(5));
        assert_eq!(store.stock_of(c.id).await, Some(10));
        assert_eq!(placement.moves.reserved, 3);
        assert_eq!(placement.moves.released, 3);
    }

    #[tokio::test]
    async fn test_place_order_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let a = store.insert_book(book("A", 5, 1000)).await.unwrap();
        let c = store.insert_book(book("C", 1, 500)).await.unwrap();

        let order = NewOrder::draft(Some(CustomerId::new()))
            .line(&a, 2)
            .line(&c, 2)
            .build()
            .unwrap();
        let err = store.place_order(order).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Rejected(DomainError::InsufficientStock { .. })
        ));
        assert_eq!(store.stock_of(a.id).await, Some(5));
        assert_eq!(store.stock_of(c.id).await, Some(1));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_rejected() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();

        let first = store
            .place_order(confirmed(customer, &b, 1, "tx-dup"))
            .await
            .unwrap()
            .order;
        let err = store
            .place_order(confirmed(customer, &b, 1, "tx-dup"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateTransaction { .. }));
        assert_eq!(store.stock_of(b.id).await, Some(4));
        let found = store.find_order_by_transaction("tx-dup").await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_once() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();
        let order = store
            .place_order(confirmed(customer, &b, 2, "tx-c"))
            .await
            .unwrap()
            .order;
        assert_eq!(store.stock_of(b.id).await, Some(3));

        let cancelled = store.cancel_order(order.id, Some(customer)).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(store.stock_of(b.id).await, Some(5));

        let err = store.cancel_order(order.id, Some(customer)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(store.stock_of(b.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_cancel_scoped_to_customer() {
        let (store, b) = store_with(5).await;
        let order = store
            .place_order(confirmed(CustomerId::new(), &b, 1, "tx-s"))
            .await
            .unwrap()
            .order;

        let err = store
            .cancel_order(order.id, Some(CustomerId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OrderNotFound(id) if id == order.id));
    }

    #[tokio::test]
    async fn test_cancel_rejected_when_delivered() {
        let (store, b) = store_with(5).await;
        let customer = CustomerId::new();
        let order = store
            .place_order(confirmed(customer, &b, 1, "tx-d"))
            .await
            .unwrap()
            .order;
        store
            .set_order_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();

        assert!(store.cancel_order(order.id, None).await.is_err());
        assert_eq!(store.stock_of(b.id).await, Some(4));
    }

    #[tokio::test]
    async fn test_record_payment_uses_order_total() {
        let (store, b) = store_with(5).await;
        let order = store
            .place_order(confirmed(CustomerId::new(), &b, 2, "tx-p"))
            .await
            .unwrap()
            .order;

        let payment = store
            .record_payment(
                order.id,
                NewPayment::paid(PaymentMethod::Visa, Some("ref".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(payment.amount, Money::from_cents(4900));

        let order = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_filters_and_pages() {
        let (store, b) = store_with(100).await;
        let customer = CustomerId::new();
        for i in 0..12u32 {
            store
                .place_order(confirmed(customer, &b, 1 + i % 3, &format!("tx-{i}")))
                .await
                .unwrap();
        }
        store
            .place_order(confirmed(CustomerId::new(), &b, 1, "other"))
            .await
            .unwrap();

        let page = store
            .list_orders(OrderQuery::for_customer(customer).page(2))
            .await
            .unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.pages, 2);
        assert_eq!(page.orders.len(), 2);

        let page = store
            .list_orders(
                OrderQuery::new()
                    .sort(crate::OrderSort::AmountDesc)
                    .limit(20),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 13);
        assert!(page.orders.windows(2).all(|w| w[0].total >= w[1].total));

        let page = store
            .list_orders(OrderQuery::new().status(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, 0);
    }

    #[tokio::test]
    async fn test_list_books_filters() {
        let store = InMemoryStore::new();
        store.insert_book(book("Le Cordon Bleu", 1, 100)).await.unwrap();
        let mut pasta = book("Pasta Grannies", 1, 100);
        pasta.category = Category::Italian;
        pasta.author = "Vicky Bennison".to_string();
        store.insert_book(pasta).await.unwrap();

        let italian = store
            .list_books(BookQuery::new().category(Category::Italian))
            .await
            .unwrap();
        assert_eq!(italian.len(), 1);

        let found = store
            .list_books(BookQuery::new().search("bennison"))
            .await
            .unwrap();
        assert_eq!(found[0].title, "Pasta Grannies");

        let all = store.list_books(BookQuery::new().limit(1)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Le Cordon Bleu");
    }
}
