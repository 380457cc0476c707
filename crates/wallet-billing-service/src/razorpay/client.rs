//! Razorpay API client implementation.

use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{CreateOrderRequest, Order, RazorpayErrorResponse};
use crate::crypto;

/// Error type for Razorpay operations.
#[derive(Debug, thiserror::Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Razorpay API returned an error.
    #[error("Razorpay API error: {code} - {description}")]
    Api {
        /// Error code.
        code: String,
        /// Error description.
        description: String,
        /// HTTP status returned by the gateway.
        status: u16,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payment signature did not match.
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Razorpay API client.
#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    api_url: String,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Arguments
    ///
    /// * `key_id` - Razorpay key id (`rzp_test_...` or `rzp_live_...`)
    /// * `key_secret` - Razorpay key secret, also the payment signing secret
    /// * `api_url` - API base URL without the `/v1` suffix
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for blank credentials and `Http` if the HTTP
    /// client cannot be built.
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, RazorpayError> {
        let key_id = key_id.into();
        let key_secret = key_secret.into();
        if key_id.trim().is_empty() || key_secret.trim().is_empty() {
            return Err(RazorpayError::Configuration(
                "key id and key secret are required".into(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            key_id,
            key_secret,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create an order for a plan payment.
    ///
    /// # Arguments
    ///
    /// * `amount` - Amount in minor units (paise)
    /// * `currency` - ISO currency code
    /// * `receipt` - Our reference for the order
    /// * `notes` - Key/value pairs stored on the order
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: Option<String>,
        notes: BTreeMap<String, String>,
    ) -> Result<Order, RazorpayError> {
        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt,
            payment_capture: 1,
            notes,
        };

        tracing::debug!(amount = amount, currency = %currency, "Creating Razorpay order");

        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get an order by ID.
    pub async fn fetch_order(&self, order_id: &str) -> Result<Order, RazorpayError> {
        let response = self
            .client
            .get(format!("{}/v1/orders/{}", self.api_url, order_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Public key id, handed to the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Verify the signature Razorpay returns after a successful checkout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` if the signature does not match.
    pub fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        if crypto::verify_payment_signature(&self.key_secret, order_id, payment_id, signature) {
            Ok(())
        } else {
            Err(RazorpayError::InvalidSignature)
        }
    }

    /// Handle API response, parsing errors if present.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RazorpayError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<RazorpayErrorResponse, _> = response.json().await;

        match error_body {
            Ok(body) => Err(RazorpayError::Api {
                code: body.error.code,
                description: body.error.description,
                status: status.as_u16(),
            }),
            Err(_) => Err(RazorpayError::Api {
                code: "unknown".to_string(),
                description: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RazorpayClient {
        RazorpayClient::new("rzp_test_key", "rzp_test_secret", server.uri()).unwrap()
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let err = RazorpayClient::new("", "secret", "http://localhost").unwrap_err();
        assert!(matches!(err, RazorpayError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_order_posts_amount_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "rzp_test_secret"))
            .and(body_partial_json(serde_json::json!({
                "amount": 49900,
                "currency": "INR",
                "payment_capture": 1,
                "notes": { "plan_id": "3" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_EKwxwAgItmmXdp",
                "entity": "order",
                "amount": 49900,
                "amount_paid": 0,
                "amount_due": 49900,
                "currency": "INR",
                "receipt": "plan-3",
                "status": "created",
                "attempts": 0,
                "notes": { "plan_id": "3" },
                "created_at": 1_582_628_071
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notes = BTreeMap::from([("plan_id".to_string(), "3".to_string())]);
        let order = client(&server)
            .create_order(49_900, "INR", Some("plan-3".into()), notes)
            .await
            .unwrap();

        assert_eq!(order.id, "order_EKwxwAgItmmXdp");
        assert_eq!(order.amount_due, 49_900);
        assert_eq!(order.notes["plan_id"], "3");
    }

    #[tokio::test]
    async fn api_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "The amount must be atleast INR 1.00",
                    "field": "amount"
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_order(10, "INR", None, BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            RazorpayError::Api { code, status, .. } => {
                assert_eq!(code, "BAD_REQUEST_ERROR");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_errors_keep_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_order(100, "INR", None, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RazorpayError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn fetch_order_reads_notes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_1"))
            .and(basic_auth("rzp_test_key", "rzp_test_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_1",
                "amount": 1000,
                "amount_paid": 1000,
                "currency": "INR",
                "status": "paid",
                "notes": { "plan_id": "7" }
            })))
            .mount(&server)
            .await;

        let order = client(&server).fetch_order("order_1").await.unwrap();
        assert_eq!(order.status, "paid");
        assert_eq!(order.notes.get("plan_id").map(String::as_str), Some("7"));
    }

    #[test]
    fn signature_check_uses_key_secret() {
        let client = RazorpayClient::new("rzp_test_key", "rzp_test_secret", "http://localhost")
            .unwrap();
        let signature = crypto::hmac_sha256_hex("rzp_test_secret", "order_1|pay_1").unwrap();

        assert!(client
            .verify_payment_signature("order_1", "pay_1", &signature)
            .is_ok());
        assert!(matches!(
            client.verify_payment_signature("order_1", "pay_2", &signature),
            Err(RazorpayError::InvalidSignature)
        ));
    }
}
