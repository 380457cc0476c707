//! Common test utilities for wallet-billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use wallet_billing_service::{create_router, AppState, ServiceConfig};
use wallet_billing_store::{MemoryStore, Store};

/// Razorpay key secret used by gateway-backed harnesses.
pub const RAZORPAY_SECRET: &str = "rzp_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The service API key for money-moving requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness on a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(Self::base_config())
    }

    /// Create a harness whose Razorpay client points at `api_url`.
    pub fn with_razorpay(api_url: &str) -> Self {
        Self::with_config(ServiceConfig {
            razorpay_key_id: Some("rzp_test_key".into()),
            razorpay_key_secret: Some(RAZORPAY_SECRET.into()),
            razorpay_api_url: api_url.into(),
            ..Self::base_config()
        })
    }

    fn base_config() -> ServiceConfig {
        ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some("test-service-key".into()),
            ..ServiceConfig::default()
        }
    }

    fn with_config(config: ServiceConfig) -> Self {
        let service_api_key = config.service_api_key.clone().unwrap_or_default();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let state = AppState::new(store, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            service_api_key,
        }
    }

    /// Attach the service API key.
    pub fn authed(&self, request: TestRequest) -> TestRequest {
        request.add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(&self.service_api_key).expect("valid header value"),
        )
    }

    /// Create an account and a wallet with the given balances; returns the wallet id.
    pub async fn create_wallet(&self, monthly: i64, fixed: i64) -> i64 {
        let response = self
            .server
            .post("/v1/accounts")
            .json(&json!({ "account_name": "Acme Corp" }))
            .await;
        response.assert_status_ok();
        let account: Value = response.json();

        let response = self
            .server
            .post("/v1/wallets")
            .json(&json!({
                "account_id": account["account_id"],
                "monthly_balance": monthly,
                "fixed_balance": fixed
            }))
            .await;
        response.assert_status_ok();
        let wallet: Value = response.json();
        wallet["wallet_id"].as_i64().expect("wallet_id")
    }

    /// Create an active plan; returns the plan id.
    pub async fn create_plan(&self, plan_amount: i64, duration_in_days: i32) -> i64 {
        let response = self
            .authed(self.server.post("/v1/plans"))
            .json(&json!({
                "plan_name": format!("Plan {plan_amount}"),
                "plan_amount": plan_amount,
                "duration_in_days": duration_in_days
            }))
            .await;
        response.assert_status_ok();
        let plan: Value = response.json();
        plan["plan_id"].as_i64().expect("plan_id")
    }

    /// Read a wallet's balance body.
    pub async fn balance(&self, wallet_id: i64) -> Value {
        let response = self
            .server
            .get(&format!("/v1/wallets/{wallet_id}/balance"))
            .await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
