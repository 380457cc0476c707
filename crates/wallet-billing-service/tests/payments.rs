//! Razorpay payment flow integration tests, against a mocked gateway.

mod common;

use axum::http::StatusCode;
use axum_test::TestResponse;
use common::{TestHarness, RAZORPAY_SECRET};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_billing_service::crypto::hmac_sha256_hex;

fn order_json(order_id: &str, amount: i64, wallet_id: i64, plan_id: i64) -> Value {
    json!({
        "id": order_id,
        "entity": "order",
        "amount": amount,
        "amount_paid": 0,
        "amount_due": amount,
        "currency": "INR",
        "status": "created",
        "attempts": 0,
        "notes": { "wallet_id": wallet_id.to_string(), "plan_id": plan_id.to_string() },
        "created_at": 1_700_000_000
    })
}

fn paid_order_json(order_id: &str, amount: i64, wallet_id: i64, plan_id: i64) -> Value {
    let mut order = order_json(order_id, amount, wallet_id, plan_id);
    order["status"] = json!("paid");
    order["amount_paid"] = json!(amount);
    order["amount_due"] = json!(0);
    order["attempts"] = json!(1);
    order
}

fn sign(order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(RAZORPAY_SECRET, &format!("{order_id}|{payment_id}")).unwrap()
}

async fn serve_order(gateway: &MockServer, order: Value) {
    let order_path = format!("/v1/orders/{}", order["id"].as_str().unwrap());
    Mock::given(method("GET"))
        .and(path(order_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(order))
        .mount(gateway)
        .await;
}

async fn verify(
    harness: &TestHarness,
    wallet_id: i64,
    plan_id: i64,
    order_id: &str,
    payment_id: &str,
) -> TestResponse {
    harness
        .authed(harness.server.post("/v1/payments/verify"))
        .json(&json!({
            "wallet_id": wallet_id,
            "plan_id": plan_id,
            "order_id": order_id,
            "payment_id": payment_id,
            "signature": sign(order_id, payment_id)
        }))
        .await
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn create_order_charges_plan_price() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(
            "order_A1", 49_900, wallet_id, plan_id,
        )))
        .expect(1)
        .mount(&gateway)
        .await;

    let response = harness
        .server
        .post("/v1/payments/orders")
        .json(&json!({ "wallet_id": wallet_id, "plan_id": plan_id }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["order_id"], "order_A1");
    assert_eq!(body["wallet_id"], wallet_id);
    assert_eq!(body["amount"], 49_900);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["key_id"], "rzp_test_key");
}

#[tokio::test]
async fn create_order_without_gateway_is_bad_gateway() {
    let harness = TestHarness::new();
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(100, 30).await;

    let response = harness
        .server
        .post("/v1/payments/orders")
        .json(&json!({ "wallet_id": wallet_id, "plan_id": plan_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn create_order_for_free_plan_is_rejected() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(0, 30).await;

    harness
        .server
        .post("/v1/payments/orders")
        .json(&json!({ "wallet_id": wallet_id, "plan_id": plan_id }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn create_order_for_unknown_wallet_is_not_found() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&gateway)
        .await;

    let harness = TestHarness::with_razorpay(&gateway.uri());
    let plan_id = harness.create_plan(100, 30).await;

    harness
        .server
        .post("/v1/payments/orders")
        .json(&json!({ "wallet_id": 999, "plan_id": plan_id }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn gateway_failure_is_bad_gateway() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Authentication failed"
            }
        })))
        .mount(&gateway)
        .await;

    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(100, 30).await;

    let response = harness
        .server
        .post("/v1/payments/orders")
        .json(&json!({ "wallet_id": wallet_id, "plan_id": plan_id }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "external_service_error");
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn verified_payment_subscribes_wallet() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;
    serve_order(&gateway, paid_order_json("order_B2", 49_900, wallet_id, plan_id)).await;

    let response = verify(&harness, wallet_id, plan_id, "order_B2", "pay_B2").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["payment_id"], "pay_B2");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["wallet_id"], wallet_id);
    assert_eq!(harness.balance(wallet_id).await["fixed_balance"], 49_900);
}

#[tokio::test]
async fn replayed_payment_credits_once() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;
    serve_order(&gateway, paid_order_json("order_R1", 49_900, wallet_id, plan_id)).await;

    verify(&harness, wallet_id, plan_id, "order_R1", "pay_R1")
        .await
        .assert_status_ok();

    for _ in 0..4 {
        let response = verify(&harness, wallet_id, plan_id, "order_R1", "pay_R1").await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "conflict");
    }

    // A second payment id against an already redeemed order is refused too.
    let response = verify(&harness, wallet_id, plan_id, "order_R1", "pay_R1_again").await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let balance = harness.balance(wallet_id).await;
    assert_eq!(balance["fixed_balance"], 49_900);
    assert_eq!(balance["total_balance"], 49_900);
}

#[tokio::test]
async fn verify_without_key_is_unauthorized() {
    let gateway = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&gateway)
        .await;

    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;

    harness
        .server
        .post("/v1/payments/verify")
        .json(&json!({
            "wallet_id": wallet_id,
            "plan_id": plan_id,
            "order_id": "order_U1",
            "payment_id": "pay_U1",
            "signature": sign("order_U1", "pay_U1")
        }))
        .await
        .assert_status_unauthorized();

    assert_eq!(harness.balance(wallet_id).await["total_balance"], 0);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(100, 30).await;

    let response = harness
        .authed(harness.server.post("/v1/payments/verify"))
        .json(&json!({
            "wallet_id": wallet_id,
            "plan_id": plan_id,
            "order_id": "order_C3",
            "payment_id": "pay_other",
            "signature": sign("order_C3", "pay_C3")
        }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_signature");
    assert_eq!(harness.balance(wallet_id).await["total_balance"], 0);
}

#[tokio::test]
async fn order_for_another_plan_is_rejected() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let cheap = harness.create_plan(100, 30).await;
    let premium = harness.create_plan(99_900, 365).await;
    serve_order(&gateway, paid_order_json("order_D4", 100, wallet_id, cheap)).await;

    verify(&harness, wallet_id, premium, "order_D4", "pay_D4")
        .await
        .assert_status_bad_request();

    assert_eq!(harness.balance(wallet_id).await["total_balance"], 0);
}

#[tokio::test]
async fn order_for_another_wallet_is_rejected() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let payer = harness.create_wallet(0, 0).await;
    let claimant = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;
    serve_order(&gateway, paid_order_json("order_W1", 49_900, payer, plan_id)).await;

    verify(&harness, claimant, plan_id, "order_W1", "pay_W1")
        .await
        .assert_status_bad_request();

    assert_eq!(harness.balance(claimant).await["total_balance"], 0);
    assert_eq!(harness.balance(payer).await["total_balance"], 0);
}

#[tokio::test]
async fn unpaid_order_is_rejected() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;
    serve_order(&gateway, order_json("order_P1", 49_900, wallet_id, plan_id)).await;

    verify(&harness, wallet_id, plan_id, "order_P1", "pay_P1")
        .await
        .assert_status_bad_request();

    assert_eq!(harness.balance(wallet_id).await["total_balance"], 0);
}

#[tokio::test]
async fn order_amount_must_match_plan_price() {
    let gateway = MockServer::start().await;
    let harness = TestHarness::with_razorpay(&gateway.uri());
    let wallet_id = harness.create_wallet(0, 0).await;
    let plan_id = harness.create_plan(49_900, 30).await;
    serve_order(&gateway, paid_order_json("order_M1", 100, wallet_id, plan_id)).await;

    let response = verify(&harness, wallet_id, plan_id, "order_M1", "pay_M1").await;

    response.assert_status_bad_request();
    assert_eq!(harness.balance(wallet_id).await["total_balance"], 0);

    let history: Value = harness
        .server
        .get(&format!("/v1/wallets/{wallet_id}/subscription/history"))
        .await
        .json();
    assert!(history["history"].as_array().unwrap().is_empty());
}
