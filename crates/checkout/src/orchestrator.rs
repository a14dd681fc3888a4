//! Cart or explicit items to order, with a hosted payment step in between.
//!
//! Two phases:
//! 1. `initiate` validates the items and either opens a payment session
//!    (deferred path, nothing is written) or places the order at once
//!    (direct path).
//! 2. `finalize` runs when the customer comes back from the processor. It is
//!    keyed on the transaction id and returns the existing order when called
//!    again, including when two calls race.

use std::collections::HashMap;
use std::time::Instant;

use common::{BookId, CustomerId};
use domain::{
    Book, DomainError, Money, NewOrder, NewPayment, Order, OrderDraft, OrderStatus, PaymentMethod,
};
use serde::{Deserialize, Serialize};
use store::{Store, StoreError};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::ledger::record_moves;
use crate::payment::{PaymentGateway, PaymentSession, SessionLineItem, SessionRequest};

/// Where the payment pages send the customer back to.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub frontend_url: String,
    pub currency: String,
}

impl CheckoutSettings {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
            currency: "eur".to_string(),
        }
    }

    pub fn success_url(&self, transaction_id: &str) -> String {
        format!(
            "{}/success?transaction_id={transaction_id}",
            self.frontend_url.trim_end_matches('/')
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/cancel", self.frontend_url.trim_end_matches('/'))
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

/// A requested line. Quantities arrive unchecked from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub book_id: BookId,
    pub quantity: i64,
}

/// Input to [`CheckoutOrchestrator::initiate`].
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    /// `None` checks out the live cart.
    pub items: Option<Vec<CheckoutItem>>,
    /// Client-held token; one is generated when absent.
    pub transaction_id: Option<String>,
    /// Place the order immediately instead of redirecting to the processor.
    pub direct: bool,
    /// Recorded on direct orders. Defaults to debit.
    pub payment_method: Option<PaymentMethod>,
}

impl CheckoutRequest {
    pub fn from_cart() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CheckoutItem>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn direct(mut self, payment_method: Option<PaymentMethod>) -> Self {
        self.direct = true;
        self.payment_method = payment_method;
        self
    }
}

/// Redirect descriptor returned by the deferred path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub transaction_id: String,
    pub session_id: String,
    pub redirect_url: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The customer must be sent to the processor.
    Redirect(CheckoutSession),
    /// The order was placed directly.
    Placed(Order),
}

/// Result of a finalize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub order: Order,
    /// True when the transaction had already produced this order.
    pub replayed: bool,
}

pub struct CheckoutOrchestrator<S, P>
where
    S: Store,
    P: PaymentGateway,
{
    store: S,
    gateway: P,
    settings: CheckoutSettings,
}

impl<S, P> CheckoutOrchestrator<S, P>
where
    S: Store,
    P: PaymentGateway,
{
    pub fn new(store: S, gateway: P, settings: CheckoutSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn gateway(&self) -> &P {
        &self.gateway
    }

    /// Validates the items and starts payment, or places the order directly.
    ///
    /// Every item is checked before anything is written; the first failing
    /// line aborts the whole checkout.
    #[tracing::instrument(skip(self, request), fields(direct = request.direct))]
    pub async fn initiate(
        &self,
        customer_id: CustomerId,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome> {
        let path = if request.direct { "direct" } else { "deferred" };
        metrics::counter!("checkout_initiated_total", "path" => path).increment(1);

        let draft = self.draft(customer_id, request.items).await?;

        if request.direct {
            let payment = NewPayment::paid(request.payment_method.unwrap_or_default(), None);
            let placed = self
                .place(draft.payment(payment), request.transaction_id)
                .await?;
            tracing::info!(order_id = %placed.order.id, total = %placed.order.total, "order placed directly");
            return Ok(CheckoutOutcome::Placed(placed.order));
        }

        let transaction_id = request
            .transaction_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session_request = SessionRequest {
            line_items: draft
                .lines()
                .iter()
                .map(|line| SessionLineItem {
                    name: line.title.clone(),
                    unit_amount: line.unit_price,
                    quantity: line.quantity,
                })
                .collect(),
            success_url: self.settings.success_url(&transaction_id),
            cancel_url: self.settings.cancel_url(),
            currency: self.settings.currency.clone(),
            transaction_id: transaction_id.clone(),
            customer_id,
        };

        let session = self
            .gateway
            .create_session(session_request)
            .await
            .map_err(|err| match err {
                CheckoutError::UpstreamPayment(_) => err,
                other => CheckoutError::UpstreamPayment(other.to_string()),
            })?;
        tracing::info!(%transaction_id, session_id = %session.id, "payment session opened");

        Ok(CheckoutOutcome::Redirect(CheckoutSession {
            transaction_id,
            session_id: session.id,
            redirect_url: session.redirect_url,
            total: draft.total(),
        }))
    }

    /// Turns a paid transaction into an order, exactly once.
    #[tracing::instrument(skip(self, items))]
    pub async fn finalize(
        &self,
        customer_id: CustomerId,
        transaction_id: &str,
        items: Option<Vec<CheckoutItem>>,
    ) -> Result<Finalized> {
        let started = Instant::now();

        if let Some(order) = self.existing(customer_id, transaction_id).await? {
            metrics::counter!("checkout_idempotent_replays_total").increment(1);
            tracing::info!(order_id = %order.id, "transaction already finalized");
            return Ok(Finalized {
                order,
                replayed: true,
            });
        }

        let draft = self.draft(customer_id, items).await?.payment(NewPayment::paid(
            PaymentMethod::HostedCheckout,
            Some(transaction_id.to_string()),
        ));
        let finalized = self
            .place(draft, Some(transaction_id.to_string()))
            .await?;

        if finalized.replayed {
            metrics::counter!("checkout_idempotent_replays_total").increment(1);
        } else {
            metrics::counter!("checkout_finalized_total").increment(1);
            metrics::histogram!("checkout_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::info!(order_id = %finalized.order.id, total = %finalized.order.total, "checkout finalized");
        }
        Ok(finalized)
    }

    /// Session the processor holds for a transaction.
    pub async fn transaction_status(&self, transaction_id: &str) -> Result<PaymentSession> {
        self.gateway
            .find_session(transaction_id)
            .await?
            .ok_or_else(|| CheckoutError::TransactionNotFound(transaction_id.to_string()))
    }

    async fn existing(&self, customer_id: CustomerId, transaction_id: &str) -> Result<Option<Order>> {
        let Some(order) = self.store.find_order_by_transaction(transaction_id).await? else {
            return Ok(None);
        };
        if order.customer_id.is_some_and(|owner| owner != customer_id) {
            return Err(CheckoutError::OrderNotFound(order.id));
        }
        Ok(Some(order))
    }

    /// Persists a confirmed order. A uniqueness conflict on the transaction
    /// id means another call got there first; its order is returned.
    async fn place(&self, draft: OrderDraft, transaction_id: Option<String>) -> Result<Finalized> {
        let order = draft
            .status(OrderStatus::Confirmed)
            .transaction_id(transaction_id)
            .build()?;
        let customer_id = order.customer_id;

        match self.store.place_order(order).await {
            Ok(placement) => {
                record_moves(placement.moves);
                Ok(Finalized {
                    order: placement.order,
                    replayed: false,
                })
            }
            Err(StoreError::DuplicateTransaction { transaction_id }) => {
                tracing::info!(%transaction_id, "concurrent finalize lost the race, returning first order");
                let order = match customer_id {
                    Some(customer_id) => self.existing(customer_id, &transaction_id).await?,
                    None => self.store.find_order_by_transaction(&transaction_id).await?,
                };
                order
                    .map(|order| Finalized {
                        order,
                        replayed: true,
                    })
                    .ok_or(CheckoutError::Store(StoreError::DuplicateTransaction {
                        transaction_id,
                    }))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves and validates the lines of a checkout.
    ///
    /// Without explicit items the live cart is used. Duplicate books are
    /// merged. A book is available up to its stock plus what the customer's
    /// cart already holds of it.
    async fn draft(
        &self,
        customer_id: CustomerId,
        items: Option<Vec<CheckoutItem>>,
    ) -> Result<OrderDraft> {
        let cart = self.store.find_cart(customer_id).await?;

        let items = match items {
            Some(items) => items,
            None => cart
                .iter()
                .flat_map(|cart| cart.lines())
                .map(|line| CheckoutItem {
                    book_id: line.book_id,
                    quantity: i64::from(line.quantity),
                })
                .collect(),
        };
        if items.is_empty() {
            return Err(DomainError::EmptyCheckout.into());
        }

        let mut books: HashMap<BookId, Book> = HashMap::new();
        let mut draft = NewOrder::draft(Some(customer_id));

        for item in &items {
            let invalid = DomainError::InvalidQuantity {
                book_id: item.book_id,
                quantity: item.quantity,
            };
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| invalid.clone())?;

            let book = match books.get(&item.book_id) {
                Some(book) => book.clone(),
                None => {
                    let book = self.store.get_book(item.book_id).await?.ok_or(
                        DomainError::BookNotFound {
                            book_id: item.book_id,
                        },
                    )?;
                    books.insert(book.id, book.clone());
                    book
                }
            };

            if draft.quantity_of(book.id).checked_add(quantity).is_none() {
                return Err(invalid.into());
            }
            draft = draft.line(&book, quantity);
        }

        for line in draft.lines() {
            let Some(book) = books.get(&line.book_id) else {
                continue;
            };
            let held = cart.as_ref().map_or(0, |c| c.reserved_for(book.id));
            let available = book.stock.saturating_add(held);
            if line.quantity > available {
                return Err(book.insufficient(line.quantity, available).into());
            }
        }

        Ok(draft)
    }
}
