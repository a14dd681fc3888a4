//! Cart aggregate.

use chrono::{DateTime, Utc};
use common::{BookId, CartId, CustomerId};
use serde::{Deserialize, Serialize};

use crate::catalog::Book;
use crate::error::DomainError;
use crate::money::Money;
use crate::order::OrderLine;

use super::plan::{CartMutation, CartOp, LineChange, LineMutation, Settlement, StockDelta};

/// A line in a cart. The units it holds are already reserved from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    /// Catalog price when the book was first added.
    pub unit_price: Money,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer's cart.
///
/// The total is derived from the lines and recomputed on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    customer_id: CustomerId,
    lines: Vec<CartLine>,
    total: Money,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a customer.
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: CartId::new(),
            customer_id,
            lines: Vec::new(),
            total: Money::zero(),
            updated_at: Utc::now(),
        }
    }

    /// Rebuilds a cart from stored rows.
    pub fn restore(
        id: CartId,
        customer_id: CustomerId,
        lines: Vec<CartLine>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let total = lines.iter().map(CartLine::subtotal).sum();
        Self {
            id,
            customer_id,
            lines,
            total,
            updated_at,
        }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, book_id: BookId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.book_id == book_id)
    }

    /// Units of `book_id` this cart holds in reservation.
    pub fn reserved_for(&self, book_id: BookId) -> u32 {
        self.line(book_id).map_or(0, |line| line.quantity)
    }

    /// Works out the line and stock changes for `op`.
    ///
    /// `book` is the current catalog entry for the targeted book and is only
    /// required when adding a book not yet in the cart.
    pub fn plan(&self, op: CartOp, book: Option<&Book>) -> Result<CartMutation, DomainError> {
        match op {
            CartOp::Add { book_id, quantity } => self.plan_add(book_id, quantity, book),
            CartOp::SetQuantity { book_id, quantity } => self.plan_set(book_id, quantity),
            CartOp::Remove { book_id } => {
                let line = self
                    .line(book_id)
                    .ok_or(DomainError::ItemNotInCart { book_id })?;
                Ok(CartMutation {
                    changes: vec![Self::delete(line)],
                })
            }
            CartOp::Clear => Ok(CartMutation {
                changes: self.lines.iter().map(Self::delete).collect(),
            }),
        }
    }

    fn plan_add(
        &self,
        book_id: BookId,
        quantity: i64,
        book: Option<&Book>,
    ) -> Result<CartMutation, DomainError> {
        let invalid = || DomainError::InvalidQuantity { book_id, quantity };
        let added = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(invalid)?;

        let line = match self.line(book_id) {
            Some(existing) => CartLine {
                quantity: existing.quantity.checked_add(added).ok_or_else(invalid)?,
                ..existing.clone()
            },
            None => {
                let book = book.ok_or(DomainError::BookNotFound { book_id })?;
                CartLine {
                    book_id,
                    title: book.title.clone(),
                    quantity: added,
                    unit_price: book.price,
                }
            }
        };

        Ok(CartMutation {
            changes: vec![LineMutation {
                book_id,
                stock: StockDelta::Reserve(added),
                line: LineChange::Upsert(line),
            }],
        })
    }

    fn plan_set(&self, book_id: BookId, quantity: i64) -> Result<CartMutation, DomainError> {
        let line = self
            .line(book_id)
            .ok_or(DomainError::ItemNotInCart { book_id })?;

        if quantity <= 0 {
            return Ok(CartMutation {
                changes: vec![Self::delete(line)],
            });
        }
        let target =
            u32::try_from(quantity).map_err(|_| DomainError::InvalidQuantity { book_id, quantity })?;

        let stock = match target.cmp(&line.quantity) {
            std::cmp::Ordering::Greater => StockDelta::Reserve(target - line.quantity),
            std::cmp::Ordering::Less => StockDelta::Release(line.quantity - target),
            std::cmp::Ordering::Equal => StockDelta::None,
        };

        Ok(CartMutation {
            changes: vec![LineMutation {
                book_id,
                stock,
                line: LineChange::Upsert(CartLine {
                    quantity: target,
                    ..line.clone()
                }),
            }],
        })
    }

    fn delete(line: &CartLine) -> LineMutation {
        LineMutation {
            book_id: line.book_id,
            stock: StockDelta::Release(line.quantity),
            line: LineChange::Delete,
        }
    }

    /// Applies a planned mutation to the in-memory lines.
    pub fn apply(&mut self, mutation: &CartMutation) {
        for change in &mutation.changes {
            match &change.line {
                LineChange::Upsert(line) => {
                    match self.lines.iter_mut().find(|l| l.book_id == change.book_id) {
                        Some(existing) => *existing = line.clone(),
                        None => self.lines.push(line.clone()),
                    }
                }
                LineChange::Delete => self.lines.retain(|l| l.book_id != change.book_id),
            }
        }
        self.total = self.lines.iter().map(CartLine::subtotal).sum();
        self.updated_at = Utc::now();
    }

    /// Empties the cart without stock bookkeeping; callers settle first.
    pub fn empty(&mut self) {
        self.lines.clear();
        self.total = Money::zero();
        self.updated_at = Utc::now();
    }

    /// Splits an order's quantities between this cart's reservations and stock.
    pub fn settle(&self, order_lines: &[OrderLine]) -> Settlement {
        let mut settlement = Settlement::default();

        for line in order_lines {
            let consumed = self.reserved_for(line.book_id).min(line.quantity);
            if consumed > 0 {
                settlement.consumed.push((line.book_id, consumed));
            }
            if line.quantity > consumed {
                settlement.draws.push((line.book_id, line.quantity - consumed));
            }
        }

        for line in &self.lines {
            let consumed = settlement.consumed_for(line.book_id);
            if line.quantity > consumed {
                settlement
                    .returns
                    .push((line.book_id, line.quantity - consumed));
            }
        }

        settlement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, ExpertiseLevel};

    fn book(stock: u32, price_cents: i64) -> Book {
        Book {
            id: BookId::new(),
            title: "Mastering Pastry".to_string(),
            author: "Anon".to_string(),
            price: Money::from_cents(price_cents),
            stock,
            category: Category::Pastry,
            expertise: ExpertiseLevel::Intermediate,
            description: None,
            created_at: Utc::now(),
        }
    }

    fn cart_with(book: &Book, quantity: i64) -> Cart {
        let mut cart = Cart::new(CustomerId::new());
        let mutation = cart
            .plan(
                CartOp::Add {
                    book_id: book.id,
                    quantity,
                },
                Some(book),
            )
            .unwrap();
        cart.apply(&mutation);
        cart
    }

    #[test]
    fn test_add_new_line_snapshots_price_and_reserves() {
        let b = book(5, 1200);
        let cart = Cart::new(CustomerId::new());

        let mutation = cart
            .plan(
                CartOp::Add {
                    book_id: b.id,
                    quantity: 3,
                },
                Some(&b),
            )
            .unwrap();

        assert_eq!(mutation.reserved(), 3);
        assert_eq!(
            mutation.changes[0].line,
            LineChange::Upsert(CartLine {
                book_id: b.id,
                title: b.title.clone(),
                quantity: 3,
                unit_price: Money::from_cents(1200),
            })
        );
    }

    #[test]
    fn test_add_existing_line_keeps_original_price() {
        let mut b = book(5, 1200);
        let mut cart = cart_with(&b, 1);
        b.price = Money::from_cents(9900);

        let mutation = cart
            .plan(
                CartOp::Add {
                    book_id: b.id,
                    quantity: 2,
                },
                Some(&b),
            )
            .unwrap();
        cart.apply(&mutation);

        let line = cart.line(b.id).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Money::from_cents(1200));
        assert_eq!(cart.total(), Money::from_cents(3600));
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let b = book(5, 1200);
        let cart = Cart::new(CustomerId::new());
        for quantity in [0, -2] {
            let err = cart
                .plan(
                    CartOp::Add {
                        book_id: b.id,
                        quantity,
                    },
                    Some(&b),
                )
                .unwrap_err();
            assert_eq!(
                err,
                DomainError::InvalidQuantity {
                    book_id: b.id,
                    quantity
                }
            );
        }
    }

    #[test]
    fn test_add_unknown_book() {
        let cart = Cart::new(CustomerId::new());
        let book_id = BookId::new();
        let err = cart
            .plan(
                CartOp::Add {
                    book_id,
                    quantity: 1,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err, DomainError::BookNotFound { book_id });
    }

    #[test]
    fn test_set_quantity_deltas() {
        let b = book(5, 1000);
        let cart = cart_with(&b, 3);

        let up = cart
            .plan(
                CartOp::SetQuantity {
                    book_id: b.id,
                    quantity: 5,
                },
                None,
            )
            .unwrap();
        assert_eq!(up.changes[0].stock, StockDelta::Reserve(2));

        let down = cart
            .plan(
                CartOp::SetQuantity {
                    book_id: b.id,
                    quantity: 1,
                },
                None,
            )
            .unwrap();
        assert_eq!(down.changes[0].stock, StockDelta::Release(2));

        let same = cart
            .plan(
                CartOp::SetQuantity {
                    book_id: b.id,
                    quantity: 3,
                },
                None,
            )
            .unwrap();
        assert_eq!(same.changes[0].stock, StockDelta::None);
    }

    #[test]
    fn test_set_quantity_zero_deletes_and_releases_all() {
        let b = book(5, 1000);
        let mut cart = cart_with(&b, 3);

        let mutation = cart
            .plan(
                CartOp::SetQuantity {
                    book_id: b.id,
                    quantity: 0,
                },
                None,
            )
            .unwrap();
        assert_eq!(mutation.released(), 3);
        assert_eq!(mutation.changes[0].line, LineChange::Delete);

        cart.apply(&mutation);
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::zero());
    }

    #[test]
    fn test_set_quantity_on_missing_line() {
        let cart = Cart::new(CustomerId::new());
        let book_id = BookId::new();
        let err = cart
            .plan(
                CartOp::SetQuantity {
                    book_id,
                    quantity: 2,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err, DomainError::ItemNotInCart { book_id });
    }

    #[test]
    fn test_clear_releases_every_line() {
        let a = book(5, 1000);
        let b = book(5, 500);
        let mut cart = cart_with(&a, 2);
        let add_b = cart
            .plan(
                CartOp::Add {
                    book_id: b.id,
                    quantity: 4,
                },
                Some(&b),
            )
            .unwrap();
        cart.apply(&add_b);

        let mutation = cart.plan(CartOp::Clear, None).unwrap();
        assert_eq!(mutation.released(), 6);
        assert_eq!(mutation.reserved(), 0);
    }

    #[test]
    fn test_settle_consumes_reservation_before_drawing_stock() {
        let a = book(5, 1000);
        let b = book(5, 500);
        let extra = book(5, 700);
        let mut cart = cart_with(&a, 3);
        let add_extra = cart
            .plan(
                CartOp::Add {
                    book_id: extra.id,
                    quantity: 2,
                },
                Some(&extra),
            )
            .unwrap();
        cart.apply(&add_extra);

        let order_lines = vec![
            OrderLine {
                book_id: a.id,
                title: a.title.clone(),
                quantity: 1,
                unit_price: a.price,
            },
            OrderLine {
                book_id: b.id,
                title: b.title.clone(),
                quantity: 2,
                unit_price: b.price,
            },
        ];

        let settlement = cart.settle(&order_lines);
        assert_eq!(settlement.consumed, vec![(a.id, 1)]);
        assert_eq!(settlement.draws, vec![(b.id, 2)]);
        assert_eq!(settlement.returns, vec![(a.id, 2), (extra.id, 2)]);
    }
}
