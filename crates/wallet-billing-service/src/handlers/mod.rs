//! API handlers.

use std::str::FromStr;

use serde::Deserialize;

use wallet_billing_core::IdError;
use wallet_billing_store::schema::MAX_PAGE_SIZE;

use crate::error::ApiError;

pub mod accounts;
pub mod health;
pub mod partners;
pub mod payments;
pub mod plans;
pub mod settlements;
pub mod subscriptions;
pub mod wallets;

/// List query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Maximum number of records to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl PageQuery {
    /// Page size to return. One extra row is fetched to compute `has_more`,
    /// so this stays one below the store's cap.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE - 1)
    }
}

/// Parse a path segment into a serial id.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse().map_err(ApiError::from)
}

/// Split a fetched page into the rows to return and whether more exist.
pub(crate) fn split_page<T>(mut rows: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    (rows, has_more)
}
