//! Order aggregate and the draft used to assemble new orders.

use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::catalog::Book;
use crate::error::DomainError;
use crate::money::Money;

use super::{NewPayment, OrderStatus, Payment};

/// A purchased line. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: BookId,
    /// Title at purchase time, for display.
    pub title: String,
    pub quantity: u32,
    /// Price per unit captured at checkout.
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns quantity × unit price.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A placed order.
///
/// Lines and total are fixed at creation; only `status` (and attached
/// payments) change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Absent once the customer account has been removed.
    pub customer_id: Option<CustomerId>,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total: Money,
    /// Checkout transaction that produced this order, unique when present.
    pub transaction_id: Option<String>,
    pub lines: Vec<OrderLine>,
    pub payments: Vec<Payment>,
}

impl Order {
    /// Returns true if the order was placed by `customer_id`.
    pub fn belongs_to(&self, customer_id: CustomerId) -> bool {
        self.customer_id == Some(customer_id)
    }

    /// Returns the sum of line subtotals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLine::subtotal).sum()
    }

    /// Returns the total number of units across lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Checks that the customer may cancel, without changing anything.
    pub fn ensure_cancellable(&self) -> Result<(), DomainError> {
        if self.status.can_cancel() {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                order_id: self.id,
                from: self.status,
                to: OrderStatus::Cancelled,
            })
        }
    }

    /// Cancels the order and returns the quantities to give back to stock.
    pub fn cancel(&mut self) -> Result<Vec<(BookId, u32)>, DomainError> {
        self.ensure_cancellable()?;
        self.status = OrderStatus::Cancelled;
        Ok(self
            .lines
            .iter()
            .map(|line| (line.book_id, line.quantity))
            .collect())
    }
}

/// A fully assembled order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total: Money,
    pub transaction_id: Option<String>,
    pub lines: Vec<OrderLine>,
    pub payment: Option<NewPayment>,
}

impl NewOrder {
    /// Returns a builder for a new order.
    pub fn draft(customer_id: Option<CustomerId>) -> OrderDraft {
        OrderDraft {
            customer_id,
            status: OrderStatus::Pending,
            transaction_id: None,
            lines: Vec::new(),
            payment: None,
        }
    }

    /// Materialises the order as it reads once stored.
    pub fn into_order(self) -> Order {
        let payments = self
            .payment
            .map(|payment| Payment {
                id: PaymentId::new(),
                order_id: self.id,
                method: payment.method,
                reference: payment.reference,
                status: payment.status,
                amount: self.total,
                paid_at: self.created_at,
            })
            .into_iter()
            .collect();

        Order {
            id: self.id,
            customer_id: self.customer_id,
            created_at: self.created_at,
            status: self.status,
            total: self.total,
            transaction_id: self.transaction_id,
            lines: self.lines,
            payments,
        }
    }
}

/// Builder for [`NewOrder`].
///
/// Adding the same book twice merges into one line at the first price seen.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    customer_id: Option<CustomerId>,
    status: OrderStatus,
    transaction_id: Option<String>,
    lines: Vec<OrderLine>,
    payment: Option<NewPayment>,
}

impl OrderDraft {
    /// Adds `quantity` units of `book` at its current catalog price.
    pub fn line(mut self, book: &Book, quantity: u32) -> Self {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.book_id == book.id) {
            existing.quantity += quantity;
        } else {
            self.lines.push(OrderLine {
                book_id: book.id,
                title: book.title.clone(),
                quantity,
                unit_price: book.price,
            });
        }
        self
    }

    /// Sets the initial status. Defaults to `Pending`.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Correlates the order with a checkout transaction.
    pub fn transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    /// Records a payment alongside the order.
    pub fn payment(mut self, payment: NewPayment) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Returns the quantity drafted so far for `book_id`.
    pub fn quantity_of(&self, book_id: BookId) -> u32 {
        self.lines
            .iter()
            .find(|line| line.book_id == book_id)
            .map_or(0, |line| line.quantity)
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the running total.
    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::subtotal).sum()
    }

    /// Builds the order. Fails if no line was added.
    pub fn build(self) -> Result<NewOrder, DomainError> {
        if self.lines.is_empty() {
            return Err(DomainError::EmptyCheckout);
        }
        let total = self.total();

        Ok(NewOrder {
            id: OrderId::new(),
            customer_id: self.customer_id,
            created_at: Utc::now(),
            status: self.status,
            total,
            transaction_id: self.transaction_id,
            lines: self.lines,
            payment: self.payment,
        })
    }
}
