//! Order history, cancellation and back-office status changes.

use common::{CustomerId, OrderId};
use domain::{Order, OrderStatus, StockMoves};
use store::{OrderPage, OrderQuery, Store};

use crate::error::{CheckoutError, Result};
use crate::ledger::record_moves;

#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order the customer placed. Someone else's order reads as
    /// not found.
    pub async fn get_for_customer(
        &self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.belongs_to(customer_id))
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// The customer's orders, newest first unless the query says otherwise.
    pub async fn history(&self, customer_id: CustomerId, query: OrderQuery) -> Result<OrderPage> {
        let query = OrderQuery {
            customer_id: Some(customer_id),
            ..query
        };
        Ok(self.store.list_orders(query).await?)
    }

    /// Cancels a customer's order and returns its units to stock.
    ///
    /// Only `PENDING` and `CONFIRMED` orders can be cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, customer_id: CustomerId, order_id: OrderId) -> Result<Order> {
        let order = self.store.cancel_order(order_id, Some(customer_id)).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        record_moves(StockMoves::released(order.total_quantity()));
        tracing::info!(%order_id, units = order.total_quantity(), "order cancelled, stock restored");
        Ok(order)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    pub async fn list(&self, query: OrderQuery) -> Result<OrderPage> {
        Ok(self.store.list_orders(query).await?)
    }

    /// Back-office status override.
    ///
    /// The value must name one of the order states; beyond that there is no
    /// transition guard and stock is not touched.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        let status: OrderStatus = status.parse()?;
        let order = self.store.set_order_status(order_id, status).await?;

        tracing::info!(%order_id, %status, "order status updated");
        Ok(order)
    }
}
