//! Authenticated callers and what they may do.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// Role attached to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper with a cart and orders.
    #[default]
    Client,
    /// Back-office staff handling orders and stock.
    Manager,
    Administrator,
}

impl Role {
    /// May hold a cart and place orders.
    pub fn can_shop(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// May use the order back-office and change order status.
    pub fn can_manage_orders(&self) -> bool {
        matches!(self, Role::Manager | Role::Administrator)
    }

    /// May edit the catalog.
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, Role::Manager | Role::Administrator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Manager => "manager",
            Role::Administrator => "administrator",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "manager" => Ok(Role::Manager),
            "administrator" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The caller of a request, as vouched for by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub customer_id: CustomerId,
    pub role: Role,
}
