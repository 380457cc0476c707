//! Razorpay API types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise).
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Our reference for the order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    /// Capture the payment automatically (1) or manually (0).
    pub payment_capture: u8,
    /// Free-form key/value notes echoed back on the order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// A Razorpay order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID (`order_...`).
    pub id: String,
    /// Always `"order"`.
    #[serde(default)]
    pub entity: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    /// Amount captured so far.
    #[serde(default)]
    pub amount_paid: i64,
    /// Amount still due.
    #[serde(default)]
    pub amount_due: i64,
    /// Currency.
    pub currency: String,
    /// Our reference.
    #[serde(default)]
    pub receipt: Option<String>,
    /// `created`, `attempted` or `paid`.
    pub status: String,
    /// Payment attempts.
    #[serde(default)]
    pub attempts: i64,
    /// Notes. Razorpay sends `[]` instead of `{}` when empty.
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: BTreeMap<String, String>,
    /// Unix timestamp.
    #[serde(default)]
    pub created_at: i64,
}

fn notes_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Notes {
        Map(BTreeMap<String, String>),
        List(Vec<serde_json::Value>),
    }

    Ok(match Notes::deserialize(deserializer)? {
        Notes::Map(map) => map,
        Notes::List(_) => BTreeMap::new(),
    })
}

/// Razorpay API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayErrorResponse {
    /// Error details.
    pub error: RazorpayErrorDetail,
}

/// Razorpay error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayErrorDetail {
    /// Error code, e.g. `BAD_REQUEST_ERROR`.
    pub code: String,
    /// Error description.
    pub description: String,
    /// Offending field.
    #[serde(default)]
    pub field: Option<String>,
}
