//! Payments recorded against orders.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Visa,
    Mastercard,
    AmericanExpress,
    #[default]
    Debit,
    Paypal,
    /// Paid on the processor's hosted checkout page.
    HostedCheckout,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Visa => "VISA",
            PaymentMethod::Mastercard => "MASTERCARD",
            PaymentMethod::AmericanExpress => "AMERICAN_EXPRESS",
            PaymentMethod::Debit => "DEBIT",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::HostedCheckout => "HOSTED_CHECKOUT",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VISA" => Ok(PaymentMethod::Visa),
            "MASTERCARD" => Ok(PaymentMethod::Mastercard),
            "AMERICAN_EXPRESS" => Ok(PaymentMethod::AmericanExpress),
            "DEBIT" => Ok(PaymentMethod::Debit),
            "PAYPAL" => Ok(PaymentMethod::Paypal),
            "HOSTED_CHECKOUT" => Ok(PaymentMethod::HostedCheckout),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Outcome of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// A payment attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    /// Reference on the processor side, e.g. the checkout transaction id.
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// Payment details supplied when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub status: PaymentStatus,
}

impl NewPayment {
    /// A settled payment.
    pub fn paid(method: PaymentMethod, reference: Option<String>) -> Self {
        Self {
            method,
            reference,
            status: PaymentStatus::Paid,
        }
    }
}
