//! Hosted payment session collaborator.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::CustomerId;
use domain::Money;
use serde::Serialize;

use crate::error::{CheckoutError, Result};

/// One line shown on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Everything the processor needs to open a session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    /// Echoed back to the success page so the client can finalize.
    pub transaction_id: String,
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
}

/// A session opened on the processor side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub id: String,
    pub transaction_id: String,
    pub redirect_url: String,
    pub amount_total: Money,
    pub currency: String,
    pub status: SessionStatus,
}

/// Trait for the hosted checkout processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a session and returns where to redirect the customer.
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession>;

    /// Looks up the session opened for a transaction id.
    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, PaymentSession>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-process stand-in for the hosted checkout processor.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    checkout_url: String,
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway whose redirect URLs start with `checkout_url`.
    pub fn new(checkout_url: impl Into<String>) -> Self {
        Self {
            checkout_url: checkout_url.into(),
            state: Arc::default(),
        }
    }

    /// Configures the gateway to refuse new sessions.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Returns the number of sessions opened.
    pub fn session_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    /// Marks a session as paid, as the processor does after the customer pays.
    pub fn complete(&self, transaction_id: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.sessions.get_mut(transaction_id) {
            Some(session) => {
                session.status = SessionStatus::Complete;
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new("https://checkout.example.com/pay")
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(CheckoutError::UpstreamPayment(
                "Payment session could not be created".to_string(),
            ));
        }

        state.next_id += 1;
        let id = format!("cs_{:06}", state.next_id);
        let session = PaymentSession {
            redirect_url: format!("{}/{id}", self.checkout_url.trim_end_matches('/')),
            id,
            transaction_id: request.transaction_id.clone(),
            amount_total: request
                .line_items
                .iter()
                .map(|item| item.unit_amount.multiply(item.quantity))
                .sum(),
            currency: request.currency,
            status: SessionStatus::Open,
        };
        state
            .sessions
            .insert(request.transaction_id, session.clone());

        Ok(session)
    }

    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>> {
        Ok(self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .get(transaction_id)
            .cloned())
    }
}
