//! Caller identity taken from headers set by the authenticating gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;
use domain::{Identity, Role};

use crate::error::ApiError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const ROLE_HEADER: &str = "x-role";

/// The authenticated caller. Rejects with 401 when the headers are missing
/// or malformed.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl Caller {
    /// Returns the customer id if the caller may shop.
    pub fn shopper(&self) -> Result<CustomerId, ApiError> {
        if self.0.role.can_shop() {
            Ok(self.0.customer_id)
        } else {
            Err(ApiError::Forbidden(format!(
                "Role {} cannot hold a cart or place orders",
                self.0.role.as_str()
            )))
        }
    }

    /// Succeeds for back-office staff.
    pub fn order_manager(&self) -> Result<(), ApiError> {
        if self.0.role.can_manage_orders() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Order management requires a manager or administrator".to_string(),
            ))
        }
    }

    /// Succeeds for catalog editors.
    pub fn catalog_manager(&self) -> Result<(), ApiError> {
        if self.0.role.can_manage_catalog() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Catalog management requires a manager or administrator".to_string(),
            ))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer_id = header(parts, CUSTOMER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?
            .parse::<CustomerId>()
            .map_err(|e| ApiError::Unauthorized(format!("Invalid customer id: {e}")))?;

        let role = match header(parts, ROLE_HEADER)? {
            Some(role) => role
                .parse::<Role>()
                .map_err(|e| ApiError::Unauthorized(format!("Invalid role: {e}")))?,
            None => Role::default(),
        };

        Ok(Caller(Identity { customer_id, role }))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::Unauthorized(format!("Malformed {name} header")))
        })
        .transpose()
}
