//! Planned cart changes, computed by the aggregate and applied by a store.

use common::BookId;

use crate::order::OrderLine;

use super::CartLine;

/// A customer request against their cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOp {
    /// Add units of a book, creating the line if needed.
    Add { book_id: BookId, quantity: i64 },
    /// Set a line to an absolute quantity; zero or less removes it.
    SetQuantity { book_id: BookId, quantity: i64 },
    /// Drop a line entirely.
    Remove { book_id: BookId },
    /// Drop every line.
    Clear,
}

impl CartOp {
    /// Book the operation targets, if it targets one.
    pub fn book_id(&self) -> Option<BookId> {
        match self {
            CartOp::Add { book_id, .. }
            | CartOp::SetQuantity { book_id, .. }
            | CartOp::Remove { book_id } => Some(*book_id),
            CartOp::Clear => None,
        }
    }
}

/// Stock movement attached to a line change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDelta {
    None,
    /// Take units out of stock; must be refused if stock is short.
    Reserve(u32),
    /// Give units back to stock.
    Release(u32),
}

/// New state of one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Upsert(CartLine),
    Delete,
}

/// Change to a single line together with its stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMutation {
    pub book_id: BookId,
    pub stock: StockDelta,
    pub line: LineChange,
}

/// Everything a store must apply, atomically, to carry out a [`CartOp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMutation {
    pub changes: Vec<LineMutation>,
}

impl CartMutation {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Units this mutation takes out of stock.
    pub fn reserved(&self) -> u64 {
        self.moves().reserved
    }

    /// Units this mutation gives back to stock.
    pub fn released(&self) -> u64 {
        self.moves().released
    }

    pub fn moves(&self) -> StockMoves {
        StockMoves::tally(self.changes.iter().map(|c| c.stock))
    }

    /// Stock movements ordered by book id, the order stores lock rows in.
    pub fn stock_deltas(&self) -> Vec<(BookId, StockDelta)> {
        by_book(
            self.changes
                .iter()
                .filter(|c| c.stock != StockDelta::None)
                .map(|c| (c.book_id, c.stock))
                .collect(),
        )
    }
}

/// Totals of the units a change takes from and gives back to stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockMoves {
    pub reserved: u64,
    pub released: u64,
}

impl StockMoves {
    fn tally(deltas: impl Iterator<Item = StockDelta>) -> Self {
        deltas.fold(Self::default(), |mut moves, delta| {
            match delta {
                StockDelta::Reserve(n) => moves.reserved += u64::from(n),
                StockDelta::Release(n) => moves.released += u64::from(n),
                StockDelta::None => {}
            }
            moves
        })
    }

    /// Moves that only give units back, as when an order is cancelled.
    pub fn released(units: u64) -> Self {
        Self {
            reserved: 0,
            released: units,
        }
    }
}

fn by_book(mut deltas: Vec<(BookId, StockDelta)>) -> Vec<(BookId, StockDelta)> {
    deltas.sort_by_key(|(book_id, _)| *book_id);
    deltas
}

/// How an order's lines are covered when a cart is turned into an order.
///
/// Units the cart already reserved are `consumed` without touching stock,
/// `draws` still have to be taken from stock, and `returns` are cart units
/// the order does not use, released back when the cart is cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    pub consumed: Vec<(BookId, u32)>,
    pub draws: Vec<(BookId, u32)>,
    pub returns: Vec<(BookId, u32)>,
}

impl Settlement {
    /// Settlement for an order placed without any cart reservation.
    pub fn uncovered(order_lines: &[OrderLine]) -> Self {
        Self {
            draws: order_lines
                .iter()
                .map(|line| (line.book_id, line.quantity))
                .collect(),
            ..Self::default()
        }
    }

    /// Units of `book_id` already covered by the cart.
    pub fn consumed_for(&self, book_id: BookId) -> u32 {
        self.consumed
            .iter()
            .find(|(id, _)| *id == book_id)
            .map_or(0, |(_, n)| *n)
    }

    pub fn moves(&self) -> StockMoves {
        StockMoves::tally(self.stock_deltas().into_iter().map(|(_, delta)| delta))
    }

    /// Draws and returns merged into one list ordered by book id.
    ///
    /// A book never appears twice: it is only drawn once the cart's units
    /// for it are all consumed, which leaves nothing to return.
    pub fn stock_deltas(&self) -> Vec<(BookId, StockDelta)> {
        by_book(
            self.draws
                .iter()
                .map(|(book_id, n)| (*book_id, StockDelta::Reserve(*n)))
                .chain(
                    self.returns
                        .iter()
                        .map(|(book_id, n)| (*book_id, StockDelta::Release(*n))),
                )
                .collect(),
        )
    }
}
