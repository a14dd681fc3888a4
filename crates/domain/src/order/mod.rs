//! Order aggregate, status machine and payments.

mod aggregate;
mod payment;
mod state;

pub use aggregate::{NewOrder, Order, OrderDraft, OrderLine};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
pub use state::OrderStatus;
