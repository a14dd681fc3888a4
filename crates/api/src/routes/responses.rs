//! Response bodies, one shape per resource.

use chrono::{DateTime, Utc};
use domain::{Book, Cart, CartLine, Order, OrderLine, Payment};
use serde::Serialize;
use store::OrderPage;

#[derive(Serialize)]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub price_cents: i64,
    pub stock: u32,
    pub category: &'static str,
    pub expertise: &'static str,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.to_string(),
            title: book.title,
            author: book.author,
            price_cents: book.price.cents(),
            stock: book.stock,
            category: book.category.as_str(),
            expertise: book.expertise.as_str(),
            description: book.description,
            created_at: book.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct LineResponse {
    pub book_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<&CartLine> for LineResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            book_id: line.book_id.to_string(),
            title: line.title.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal().cents(),
        }
    }
}

impl From<&OrderLine> for LineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            book_id: line.book_id.to_string(),
            title: line.title.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal().cents(),
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub customer_id: String,
    pub lines: Vec<LineResponse>,
    pub total_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id().to_string(),
            customer_id: cart.customer_id().to_string(),
            lines: cart.lines().iter().map(LineResponse::from).collect(),
            total_cents: cart.total().cents(),
            updated_at: cart.updated_at(),
        }
    }
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub method: &'static str,
    pub reference: Option<String>,
    pub status: &'static str,
    pub amount_cents: i64,
    pub paid_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            method: payment.method.as_str(),
            reference: payment.reference,
            status: payment.status.as_str(),
            amount_cents: payment.amount.cents(),
            paid_at: payment.paid_at,
        }
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: &'static str,
    pub total_cents: i64,
    pub transaction_id: Option<String>,
    pub lines: Vec<LineResponse>,
    pub payments: Vec<PaymentResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.map(|c| c.to_string()),
            created_at: order.created_at,
            status: order.status.as_str(),
            total_cents: order.total.cents(),
            transaction_id: order.transaction_id,
            lines: order.lines.iter().map(LineResponse::from).collect(),
            payments: order.payments.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderPageResponse {
    pub orders: Vec<OrderResponse>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl From<OrderPage> for OrderPageResponse {
    fn from(page: OrderPage) -> Self {
        Self {
            orders: page.orders.into_iter().map(OrderResponse::from).collect(),
            page: page.page,
            pages: page.pages,
            total: page.total,
        }
    }
}
