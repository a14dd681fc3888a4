//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{BookId, CustomerId};
use domain::{
    Book, CartOp, Category, DomainError, ExpertiseLevel, Money, NewOrder, NewPayment, OrderStatus,
    PaymentMethod,
};
use sqlx::PgPool;
use store::{BookQuery, OrderQuery, OrderSort, PostgresStore, Store, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_shop_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, order_lines, orders, cart_lines, carts, books")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn book(title: &str, stock: u32) -> Book {
    Book {
        id: BookId::new(),
        title: title.to_string(),
        author: "Marcella Hazan".to_string(),
        price: Money::from_cents(1990),
        stock,
        category: Category::Italian,
        expertise: ExpertiseLevel::Intermediate,
        description: Some("Classic".to_string()),
        created_at: Utc::now(),
    }
}

async fn stock_of(store: &PostgresStore, book_id: BookId) -> u32 {
    store.get_book(book_id).await.unwrap().unwrap().stock
}

fn confirmed(customer: CustomerId, b: &Book, quantity: u32, tx: &str) -> NewOrder {
    NewOrder::draft(Some(customer))
        .line(b, quantity)
        .status(OrderStatus::Confirmed)
        .transaction_id(Some(tx.to_string()))
        .payment(NewPayment::paid(
            PaymentMethod::HostedCheckout,
            Some(tx.to_string()),
        ))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_book_round_trip_and_filters() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Essentials of Italian Cooking", 3)).await.unwrap();
    let mut other = book("Tartine", 1);
    other.category = Category::Pastry;
    other.author = "Chad Robertson".to_string();
    store.insert_book(other).await.unwrap();

    let loaded = store.get_book(b.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, b.title);
    assert_eq!(loaded.price, Money::from_cents(1990));
    assert_eq!(loaded.category, Category::Italian);

    let pastry = store
        .list_books(BookQuery::new().category(Category::Pastry))
        .await
        .unwrap();
    assert_eq!(pastry.len(), 1);

    let found = store
        .list_books(BookQuery::new().search("robertson"))
        .await
        .unwrap();
    assert_eq!(found[0].title, "Tartine");
}

#[tokio::test]
async fn test_conditional_reserve_never_goes_negative() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Last Copy", 1)).await.unwrap();

    let (first, second) = tokio::join!(store.reserve_stock(b.id, 1), store.reserve_stock(b.id, 1));
    let successes = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(stock_of(&store, b.id).await, 0);

    let err = store.reserve_stock(b.id, 1).await.unwrap_err();
    match err {
        StoreError::Rejected(DomainError::InsufficientStock {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 1);
            assert_eq!(available, 0);
        }
        other => panic!("Expected InsufficientStock, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cart_delta_scenario() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Ottolenghi Simple", 5)).await.unwrap();
    let customer = CustomerId::new();

    store
        .mutate_cart(customer, CartOp::Add { book_id: b.id, quantity: 3 })
        .await
        .unwrap();
    assert_eq!(stock_of(&store, b.id).await, 2);

    store
        .mutate_cart(customer, CartOp::SetQuantity { book_id: b.id, quantity: 5 })
        .await
        .unwrap();
    assert_eq!(stock_of(&store, b.id).await, 0);

    let update = store
        .mutate_cart(customer, CartOp::SetQuantity { book_id: b.id, quantity: 1 })
        .await
        .unwrap();
    assert_eq!(stock_of(&store, b.id).await, 4);
    assert_eq!(update.cart.total(), Money::from_cents(1990));
    assert_eq!(update.moves.released, 4);

    let order = store
        .place_order(confirmed(customer, &b, 1, "tx1"))
        .await
        .unwrap()
        .order;
    assert_eq!(order.payments.len(), 1);
    assert_eq!(stock_of(&store, b.id).await, 4);

    let cart = store.find_cart(customer).await.unwrap().unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_refused_cart_add_changes_nothing() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Scarce", 2)).await.unwrap();
    let customer = CustomerId::new();

    let err = store
        .mutate_cart(customer, CartOp::Add { book_id: b.id, quantity: 3 })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rejected(DomainError::InsufficientStock { .. })
    ));

    assert_eq!(stock_of(&store, b.id).await, 2);
    let cart = store.get_or_create_cart(customer).await.unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_transaction_id_is_unique() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Twice", 5)).await.unwrap();
    let customer = CustomerId::new();

    let first = store
        .place_order(confirmed(customer, &b, 1, "tx-unique"))
        .await
        .unwrap()
        .order;
    let err = store
        .place_order(confirmed(customer, &b, 1, "tx-unique"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateTransaction { .. }));
    assert_eq!(stock_of(&store, b.id).await, 4);

    let found = store
        .find_order_by_transaction("tx-unique")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.lines.len(), 1);
}

#[tokio::test]
async fn test_failed_order_rolls_back() {
    let store = get_test_store().await;
    let plenty = store.insert_book(book("Plenty", 5)).await.unwrap();
    let scarce = store.insert_book(book("Scarce", 1)).await.unwrap();

    let order = NewOrder::draft(Some(CustomerId::new()))
        .line(&plenty, 2)
        .line(&scarce, 2)
        .transaction_id(Some("tx-rollback".to_string()))
        .build()
        .unwrap();
    let err = store.place_order(order).await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::Rejected(DomainError::InsufficientStock { .. })
    ));
    assert_eq!(stock_of(&store, plenty.id).await, 5);
    assert_eq!(stock_of(&store, scarce.id).await, 1);
    assert!(
        store
            .find_order_by_transaction("tx-rollback")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Returnable", 5)).await.unwrap();
    let customer = CustomerId::new();
    let order = store
        .place_order(confirmed(customer, &b, 3, "tx-cancel"))
        .await
        .unwrap()
        .order;

    let err = store
        .cancel_order(order.id, Some(CustomerId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::OrderNotFound(_)));

    let cancelled = store.cancel_order(order.id, Some(customer)).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, b.id).await, 5);

    let reloaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_list_orders_pages_and_sorts() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Bulk", 100)).await.unwrap();
    let customer = CustomerId::new();
    for i in 0..5u32 {
        store
            .place_order(confirmed(customer, &b, i + 1, &format!("tx-list-{i}")))
            .await
            .unwrap();
    }
    let shipped = store
        .place_order(confirmed(CustomerId::new(), &b, 1, "tx-list-other"))
        .await
        .unwrap()
        .order;
    store
        .set_order_status(shipped.id, OrderStatus::Shipping)
        .await
        .unwrap();

    let page = store
        .list_orders(
            OrderQuery::for_customer(customer)
                .sort(OrderSort::AmountDesc)
                .limit(2),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.pages, 3);
    assert_eq!(page.orders[0].total, Money::from_cents(1990 * 5));
    assert_eq!(page.orders[0].lines.len(), 1);

    let page = store
        .list_orders(OrderQuery::new().status(OrderStatus::Shipping))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.orders[0].id, shipped.id);
}

#[tokio::test]
async fn test_crossed_checkouts_do_not_deadlock() {
    let store = get_test_store().await;
    let a = store.insert_book(book("Arabesque", 100)).await.unwrap();
    let b = store.insert_book(book("Bouchon", 100)).await.unwrap();
    let first = CustomerId::new();
    let second = CustomerId::new();

    for i in 0..25 {
        store
            .mutate_cart(first, CartOp::Add { book_id: b.id, quantity: 1 })
            .await
            .unwrap();
        store
            .mutate_cart(second, CartOp::Add { book_id: a.id, quantity: 1 })
            .await
            .unwrap();

        // Each checkout draws the book the other one holds in its cart.
        let (left, right) = tokio::join!(
            store.place_order(confirmed(first, &a, 1, &format!("tx-cross-a-{i}"))),
            store.place_order(confirmed(second, &b, 1, &format!("tx-cross-b-{i}"))),
        );
        let left = left.unwrap();
        let right = right.unwrap();
        assert_eq!(left.moves.reserved, 1);
        assert_eq!(left.moves.released, 1);
        assert_eq!(right.moves.reserved, 1);
        assert_eq!(right.moves.released, 1);
    }

    assert_eq!(stock_of(&store, a.id).await, 75);
    assert_eq!(stock_of(&store, b.id).await, 75);
}

#[tokio::test]
async fn test_release_past_max_stock_is_refused() {
    let store = get_test_store().await;
    let b = store.insert_book(book("Bottomless", u32::MAX - 2)).await.unwrap();

    let err = store.release_stock(b.id, 5).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rejected(DomainError::InvalidQuantity { quantity: 5, .. })
    ));
    assert_eq!(stock_of(&store, b.id).await, u32::MAX - 2);

    assert_eq!(store.release_stock(b.id, 2).await.unwrap(), u32::MAX);
    assert_eq!(stock_of(&store, b.id).await, u32::MAX);

    let err = store.release_stock(BookId::new(), 1).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Rejected(DomainError::BookNotFound { .. })
    ));
}
