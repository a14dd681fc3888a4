//! Cart aggregate and its planned mutations.

mod aggregate;
mod plan;

pub use aggregate::{Cart, CartLine};
pub use plan::{
    CartMutation, CartOp, LineChange, LineMutation, Settlement, StockDelta, StockMoves,
};
