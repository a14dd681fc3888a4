//! HTTP route handlers.

pub mod admin;
pub mod books;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod responses;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, rejecting malformed ones with 400.
pub(crate) fn parse_id<T>(id: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
