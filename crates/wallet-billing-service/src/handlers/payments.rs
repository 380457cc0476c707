//! Razorpay payment handlers.
//!
//! The checkout flow is: `POST /v1/payments/orders` creates a gateway order
//! for a wallet and a plan's price, the client pays it, and
//! `POST /v1/payments/verify` checks the gateway's signature, confirms the
//! order was paid in full for that wallet and plan, and subscribes the wallet.
//!
//! Verification is a service call: the paying client hands its checkout
//! result to a backend holding the service key. A payment is redeemed at
//! most once; replaying it is a conflict.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wallet_billing_core::{
    BillingError, NewGatewayPayment, PlanId, SubscriptionResult, WalletId,
};
use wallet_billing_store::subscriptions;

use super::plans::find_plan;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::razorpay::{Order, RazorpayClient};
use crate::state::AppState;

/// Order note carrying the plan the order pays for.
const PLAN_ID_NOTE: &str = "plan_id";

/// Order note carrying the wallet the order pays into.
const WALLET_ID_NOTE: &str = "wallet_id";

/// Gateway order status once the full amount is captured.
const ORDER_PAID: &str = "paid";

/// Create order request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Wallet the payment is for.
    pub wallet_id: WalletId,
    /// Plan to pay for.
    pub plan_id: PlanId,
}

/// Create order response.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    /// Gateway order ID, passed to the checkout widget.
    pub order_id: String,
    /// Wallet being paid for.
    pub wallet_id: WalletId,
    /// Plan being paid for.
    pub plan_id: PlanId,
    /// Plan name.
    pub plan_name: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Currency.
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key_id: String,
}

/// Create a gateway order for a plan's price, bound to a wallet.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let razorpay = gateway(&state)?;

    if state.store.get_wallet(body.wallet_id).await?.is_none() {
        return Err(BillingError::not_found("wallet", body.wallet_id).into());
    }

    let plan = find_plan(&state, body.plan_id).await?;
    if !plan.is_active {
        return Err(BillingError::PlanInactive {
            plan_id: plan.plan_id.get(),
        }
        .into());
    }
    if plan.price <= 0 {
        return Err(ApiError::BadRequest(format!(
            "plan {} has no price to pay",
            plan.plan_id
        )));
    }

    let notes = BTreeMap::from([
        (WALLET_ID_NOTE.to_string(), body.wallet_id.to_string()),
        (PLAN_ID_NOTE.to_string(), plan.plan_id.to_string()),
        ("plan_name".to_string(), plan.plan_name.clone()),
    ]);
    let receipt = format!("rcpt_{}", Uuid::new_v4().simple());

    let order = razorpay
        .create_order(plan.price, &state.config.currency, Some(receipt), notes)
        .await?;

    tracing::info!(
        order_id = %order.id,
        wallet_id = %body.wallet_id,
        plan_id = %plan.plan_id,
        amount = order.amount,
        "Payment order created"
    );

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        wallet_id: body.wallet_id,
        plan_id: plan.plan_id,
        plan_name: plan.plan_name,
        amount: order.amount,
        currency: order.currency,
        key_id: razorpay.key_id().to_string(),
    }))
}

/// Verify payment request, as returned by the checkout widget.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Wallet to subscribe.
    pub wallet_id: WalletId,
    /// Plan that was paid for.
    pub plan_id: PlanId,
    /// `razorpay_order_id`.
    pub order_id: String,
    /// `razorpay_payment_id`.
    pub payment_id: String,
    /// `razorpay_signature`.
    pub signature: String,
}

/// Verify payment response.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// Gateway order ID.
    pub order_id: String,
    /// Gateway payment ID.
    pub payment_id: String,
    /// The resulting subscription.
    pub subscription: SubscriptionResult,
}

/// Verify a completed checkout and subscribe the wallet to the paid plan.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let razorpay = gateway(&state)?;

    if let Err(e) =
        razorpay.verify_payment_signature(&body.order_id, &body.payment_id, &body.signature)
    {
        tracing::warn!(
            order_id = %body.order_id,
            payment_id = %body.payment_id,
            "Payment signature verification failed"
        );
        return Err(e.into());
    }

    if let Some(redeemed) = state.store.get_gateway_payment(&body.payment_id).await? {
        return Err(ApiError::Conflict(format!(
            "payment {} was already redeemed for subscription {}",
            redeemed.payment_id, redeemed.subscription_id
        )));
    }

    let order = razorpay.fetch_order(&body.order_id).await?;
    check_order(&order, &body)?;

    let plan = find_plan(&state, body.plan_id).await?;
    if order.amount != plan.price {
        return Err(ApiError::BadRequest(format!(
            "order {} is for {} but plan {} costs {}",
            order.id, order.amount, plan.plan_id, plan.price
        )));
    }

    let payment = NewGatewayPayment {
        payment_id: body.payment_id.clone(),
        order_id: body.order_id.clone(),
        wallet_id: body.wallet_id,
        plan_id: body.plan_id,
        amount: order.amount,
    };
    let subscription = subscriptions::subscribe_paid(state.store.as_ref(), payment).await?;

    tracing::info!(
        service = %auth.service_name,
        order_id = %body.order_id,
        payment_id = %body.payment_id,
        wallet_id = %body.wallet_id,
        subscription_id = %subscription.subscription_id,
        "Payment verified"
    );

    Ok(Json(VerifyPaymentResponse {
        order_id: body.order_id,
        payment_id: body.payment_id,
        subscription,
    }))
}

/// The order must be fully paid and carry the wallet and plan being claimed.
fn check_order(order: &Order, body: &VerifyPaymentRequest) -> Result<(), ApiError> {
    if order.status != ORDER_PAID {
        return Err(ApiError::BadRequest(format!(
            "order {} is {}, not {ORDER_PAID}",
            order.id, order.status
        )));
    }
    if order.notes.get(WALLET_ID_NOTE) != Some(&body.wallet_id.to_string()) {
        return Err(ApiError::BadRequest(format!(
            "order {} was not created for wallet {}",
            order.id, body.wallet_id
        )));
    }
    if order.notes.get(PLAN_ID_NOTE) != Some(&body.plan_id.to_string()) {
        return Err(ApiError::BadRequest(format!(
            "order {} was not created for plan {}",
            order.id, body.plan_id
        )));
    }
    Ok(())
}

fn gateway(state: &AppState) -> Result<&RazorpayClient, ApiError> {
    state
        .razorpay
        .as_deref()
        .ok_or_else(|| ApiError::ExternalService("Razorpay not configured".into()))
}
