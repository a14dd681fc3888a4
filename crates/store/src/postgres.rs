use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, CartId, CustomerId, OrderId, PaymentId};
use domain::{
    Book, Cart, CartLine, CartOp, DomainError, LineChange, Money, NewOrder, NewPayment, Order,
    OrderLine, OrderStatus, Payment, Settlement, StockDelta,
};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    BookQuery, CartUpdate, OrderPage, OrderQuery, Placement, Result, Store, StoreError,
};

const BOOK_COLUMNS: &str =
    "id, title, author, price_cents, stock, category, expertise, description, created_at";
const ORDER_COLUMNS: &str = "id, customer_id, created_at, status, total_cents, transaction_id";

/// PostgreSQL-backed store.
///
/// Stock is taken with `UPDATE .. WHERE stock >= $n`, so two writers racing
/// for the last units cannot both succeed. Multi-row operations run in one
/// transaction and roll back on any error.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_book(row: &PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: count(row, "stock")?,
            category: parse(row.try_get("category")?)?,
            expertise: parse(row.try_get("expertise")?)?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Order header without lines or payments.
    fn row_to_order(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            customer_id: row
                .try_get::<Option<Uuid>, _>("customer_id")?
                .map(CustomerId::from_uuid),
            created_at: row.try_get("created_at")?,
            status: parse(row.try_get("status")?)?,
            total: Money::from_cents(row.try_get("total_cents")?),
            transaction_id: row.try_get("transaction_id")?,
            lines: Vec::new(),
            payments: Vec::new(),
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            method: parse(row.try_get("method")?)?,
            reference: row.try_get("reference")?,
            status: parse(row.try_get("status")?)?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            paid_at: row.try_get("paid_at")?,
        })
    }

    async fn fetch_book(conn: &mut PgConnection, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(book_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(Self::row_to_book).transpose()
    }

    /// Conditionally takes `quantity` units. `covered` units the caller
    /// already holds are folded into the rejection so it reads as what the
    /// customer asked for and what they could have had.
    async fn take(
        conn: &mut PgConnection,
        book_id: BookId,
        quantity: u32,
        covered: u32,
    ) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE books SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(book_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *conn)
        .await
        .map_err(conflict_or_database)?;

        match stock {
            Some(stock) => to_count("stock", stock),
            None => {
                let book = Self::fetch_book(conn, book_id)
                    .await?
                    .ok_or(DomainError::BookNotFound { book_id })?;
                Err(book
                    .insufficient(quantity + covered, book.stock + covered)
                    .into())
            }
        }
    }

    /// Gives `quantity` units back, refusing any release that would leave
    /// stock above `u32::MAX`.
    async fn give_back(conn: &mut PgConnection, book_id: BookId, quantity: u32) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE books SET stock = stock + $2 WHERE id = $1 AND stock <= $3 - $2 RETURNING stock",
        )
        .bind(book_id.as_uuid())
        .bind(i64::from(quantity))
        .bind(i64::from(u32::MAX))
        .fetch_optional(&mut *conn)
        .await
        .map_err(conflict_or_database)?;

        match stock {
            Some(stock) => to_count("stock", stock),
            None => {
                Self::fetch_book(conn, book_id)
                    .await?
                    .ok_or(DomainError::BookNotFound { book_id })?;
                Err(DomainError::InvalidQuantity {
                    book_id,
                    quantity: i64::from(quantity),
                }
                .into())
            }
        }
    }

    /// Applies stock movements in the order given. Callers pass them sorted
    /// by book id so concurrent transactions lock book rows in one order.
    async fn move_stock(
        conn: &mut PgConnection,
        deltas: &[(BookId, StockDelta)],
        covered: impl Fn(BookId) -> u32,
    ) -> Result<()> {
        for (book_id, delta) in deltas {
            match *delta {
                StockDelta::Reserve(n) => {
                    Self::take(conn, *book_id, n, covered(*book_id)).await?;
                }
                StockDelta::Release(n) => {
                    Self::give_back(conn, *book_id, n).await?;
                }
                StockDelta::None => {}
            }
        }
        Ok(())
    }

    async fn ensure_cart(conn: &mut PgConnection, customer_id: CustomerId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, customer_id, total_cents, updated_at)
            VALUES ($1, $2, 0, NOW())
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(customer_id.as_uuid())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn load_cart(
        conn: &mut PgConnection,
        customer_id: CustomerId,
        for_update: bool,
    ) -> Result<Option<Cart>> {
        let sql = if for_update {
            "SELECT id, updated_at FROM carts WHERE customer_id = $1 FOR UPDATE"
        } else {
            "SELECT id, updated_at FROM carts WHERE customer_id = $1"
        };
        let Some(row) = sqlx::query(sql)
            .bind(customer_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };
        let cart_id: Uuid = row.try_get("id")?;

        let line_rows = sqlx::query(
            r#"
            SELECT l.book_id, b.title, l.quantity, l.unit_price_cents
            FROM cart_lines l
            JOIN books b ON b.id = l.book_id
            WHERE l.cart_id = $1
            ORDER BY l.added_at ASC, l.book_id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

        let lines = line_rows
            .iter()
            .map(|r| {
                Ok(CartLine {
                    book_id: BookId::from_uuid(r.try_get("book_id")?),
                    title: r.try_get("title")?,
                    quantity: count(r, "quantity")?,
                    unit_price: Money::from_cents(r.try_get("unit_price_cents")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart::restore(
            CartId::from_uuid(cart_id),
            customer_id,
            lines,
            row.try_get("updated_at")?,
        )))
    }

    async fn empty_cart(conn: &mut PgConnection, cart: &Cart) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE carts SET total_cents = 0, updated_at = NOW() WHERE id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Attaches lines and payments to order headers.
    async fn hydrate_orders(conn: &mut PgConnection, rows: &[PgRow]) -> Result<Vec<Order>> {
        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, book_id, title, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for r in &line_rows {
            lines
                .entry(r.try_get("order_id")?)
                .or_default()
                .push(OrderLine {
                    book_id: BookId::from_uuid(r.try_get("book_id")?),
                    title: r.try_get("title")?,
                    quantity: count(r, "quantity")?,
                    unit_price: Money::from_cents(r.try_get("unit_price_cents")?),
                });
        }

        let payment_rows = sqlx::query(
            r#"
            SELECT id, order_id, method, reference, status, amount_cents, paid_at
            FROM payments
            WHERE order_id = ANY($1)
            ORDER BY paid_at ASC, id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut payments: HashMap<Uuid, Vec<Payment>> = HashMap::new();
        for r in &payment_rows {
            let payment = Self::row_to_payment(r)?;
            payments
                .entry(payment.order_id.as_uuid())
                .or_default()
                .push(payment);
        }

        for order in &mut orders {
            let id = order.id.as_uuid();
            order.lines = lines.remove(&id).unwrap_or_default();
            order.payments = payments.remove(&id).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn fetch_order(
        conn: &mut PgConnection,
        order_id: OrderId,
        for_update: bool,
    ) -> Result<Option<Order>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Self::hydrate_orders(conn, &[row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, reference, status, amount_cents, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(payment.status.as_str())
        .bind(payment.amount.cents())
        .bind(payment.paid_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_book(&self, book: Book) -> Result<Book> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, price_cents, stock, category, expertise, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.price.cents())
        .bind(i64::from(book.stock))
        .bind(book.category.as_str())
        .bind(book.expertise.as_str())
        .bind(&book.description)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;

        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_book(&mut conn, book_id).await
    }

    async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>> {
        let mut sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE 1=1");
        let mut param_count = 0;
        let needle = query.needle().map(|n| format!("%{n}%"));

        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if query.expertise.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND expertise = ${param_count}"));
        }
        if needle.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (title ILIKE ${param_count} OR author ILIKE ${param_count})"
            ));
        }

        sql.push_str(" ORDER BY title ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(category) = query.category {
            sqlx_query = sqlx_query.bind(category.as_str());
        }
        if let Some(expertise) = query.expertise {
            sqlx_query = sqlx_query.bind(expertise.as_str());
        }
        if let Some(needle) = needle {
            sqlx_query = sqlx_query.bind(needle);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_book).collect()
    }

    async fn reserve_stock(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        Self::take(&mut conn, book_id, quantity, 0).await
    }

    async fn release_stock(&self, book_id: BookId, quantity: u32) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        Self::give_back(&mut conn, book_id, quantity).await
    }

    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_cart(&mut conn, customer_id, false).await
    }

    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_cart(&mut tx, customer_id).await?;
        let cart = Self::load_cart(&mut tx, customer_id, false).await?;
        tx.commit().await?;

        cart.ok_or_else(|| StoreError::Decode(format!("cart for {customer_id} missing after upsert")))
    }

    async fn mutate_cart(&self, customer_id: CustomerId, op: CartOp) -> Result<CartUpdate> {
        let mut tx = self.pool.begin().await?;

        Self::ensure_cart(&mut tx, customer_id).await?;
        let mut cart = Self::load_cart(&mut tx, customer_id, true)
            .await?
            .ok_or_else(|| {
                StoreError::Decode(format!("cart for {customer_id} missing after upsert"))
            })?;
        let book = match op.book_id() {
            Some(book_id) => Self::fetch_book(&mut tx, book_id).await?,
            None => None,
        };
        let mutation = cart.plan(op, book.as_ref())?;

        Self::move_stock(&mut tx, &mutation.stock_deltas(), |book_id| match op {
            CartOp::SetQuantity { .. } => cart.reserved_for(book_id),
            _ => 0,
        })
        .await?;

        for change in &mutation.changes {
            match &change.line {
                LineChange::Upsert(line) => {
                    sqlx::query(
                        r#"
                        INSERT INTO cart_lines (cart_id, book_id, quantity, unit_price_cents, added_at)
                        VALUES ($1, $2, $3, $4, NOW())
                        ON CONFLICT (cart_id, book_id) DO UPDATE SET quantity = EXCLUDED.quantity
                        "#,
                    )
                    .bind(cart.id().as_uuid())
                    .bind(line.book_id.as_uuid())
                    .bind(i64::from(line.quantity))
                    .bind(line.unit_price.cents())
                    .execute(&mut *tx)
                    .await?;
                }
                LineChange::Delete => {
                    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND book_id = $2")
                        .bind(cart.id().as_uuid())
                        .bind(change.book_id.as_uuid())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        cart.apply(&mutation);
        sqlx::query("UPDATE carts SET total_cents = $2, updated_at = $3 WHERE id = $1")
            .bind(cart.id().as_uuid())
            .bind(cart.total().cents())
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(conflict_or_database)?;
        Ok(CartUpdate {
            cart,
            moves: mutation.moves(),
        })
    }

    async fn place_order(&self, order: NewOrder) -> Result<Placement> {
        let order = order.into_order();
        let mut tx = self.pool.begin().await?;

        // Inserted first so a concurrent duplicate waits on the unique index.
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, created_at, status, total_cents, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.map(|c| c.as_uuid()))
        .bind(order.created_at)
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(&order.transaction_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_transaction")
            {
                return StoreError::DuplicateTransaction {
                    transaction_id: order.transaction_id.clone().unwrap_or_default(),
                };
            }
            StoreError::Database(e)
        })?;

        let cart = match order.customer_id {
            Some(customer_id) => Self::load_cart(&mut tx, customer_id, true).await?,
            None => None,
        };
        let settlement = match &cart {
            Some(cart) => cart.settle(&order.lines),
            None => Settlement::uncovered(&order.lines),
        };

        Self::move_stock(&mut tx, &settlement.stock_deltas(), |book_id| {
            settlement.consumed_for(book_id)
        })
        .await?;
        if let Some(cart) = &cart {
            Self::empty_cart(&mut tx, cart).await?;
        }

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, book_id, title, quantity, unit_price_cents, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line.book_id.as_uuid())
            .bind(&line.title)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        for payment in &order.payments {
            Self::insert_payment(&mut tx, payment).await?;
        }

        tx.commit().await.map_err(conflict_or_database)?;
        Ok(Placement {
            order,
            moves: settlement.moves(),
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, order_id, false).await
    }

    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Self::hydrate_orders(&mut conn, &[row])
                .await?
                .into_iter()
                .next()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.customer_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.from.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) AS total FROM orders{filter}");
        let page_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY {} LIMIT ${} OFFSET ${}",
            query.sort.order_by(),
            param_count + 1,
            param_count + 2,
        );

        let mut conn = self.pool.acquire().await?;

        let total: i64 = bind_order_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&mut *conn)
            .await?
            .try_get("total")?;

        let rows = bind_order_filters(sqlx::query(&page_sql), &query)
            .bind(i64::from(query.effective_limit()))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&mut *conn)
            .await?;
        let orders = Self::hydrate_orders(&mut conn, &rows).await?;

        Ok(query.page_of(orders, u64::try_from(total).unwrap_or(0)))
    }

    async fn cancel_order(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = Self::fetch_order(&mut tx, order_id, true)
            .await?
            .filter(|o| customer_id.is_none_or(|c| o.belongs_to(c)))
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let mut returns = order.cancel()?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(order.status.as_str())
            .execute(&mut *tx)
            .await?;

        returns.sort_by_key(|(book_id, _)| *book_id);
        for (book_id, quantity) in returns {
            Self::give_back(&mut tx, book_id, quantity).await?;
        }

        tx.commit().await.map_err(conflict_or_database)?;
        Ok(order)
    }

    async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        let order = Self::fetch_order(&mut tx, order_id, false)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        tx.commit().await?;
        Ok(order)
    }

    async fn record_payment(&self, order_id: OrderId, payment: NewPayment) -> Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_cents FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let total = total.ok_or(StoreError::OrderNotFound(order_id))?;

        let payment = Payment {
            id: PaymentId::new(),
            order_id,
            method: payment.method,
            reference: payment.reference,
            status: payment.status,
            amount: Money::from_cents(total),
            paid_at: Utc::now(),
        };
        Self::insert_payment(&mut tx, &payment).await?;

        tx.commit().await?;
        Ok(payment)
    }
}

fn bind_order_filters<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    filters: &OrderQuery,
) -> Query<'q, Postgres, PgArguments> {
    if let Some(customer_id) = filters.customer_id {
        query = query.bind(customer_id.as_uuid());
    }
    if let Some(status) = filters.status {
        query = query.bind(status.as_str());
    }
    if let Some(from) = filters.from {
        query = query.bind(from);
    }
    if let Some(to) = filters.to {
        query = query.bind(to);
    }
    query
}

/// Serialization failures and deadlocks mean another writer won the race.
fn conflict_or_database(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
    {
        tracing::warn!(error = %db_err, "Transaction aborted by concurrent writer");
        return StoreError::ConcurrencyConflict(db_err.message().to_string());
    }
    StoreError::Database(e)
}

fn parse<T>(value: String) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Decode(e.to_string()))
}

fn count(row: &PgRow, column: &str) -> Result<u32> {
    to_count(column, row.try_get(column)?)
}

fn to_count(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}
