//! Subscription record handlers.
//!
//! Shells created here are inactive and unbilled; they go live through
//! `POST /v1/subscriptions/:id/complete`, which debits the wallet.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use wallet_billing_core::{BillingError, NewSubscription, PlanId, Subscription, SubscriptionId, WalletId};
use wallet_billing_store::subscriptions;

use super::parse_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Create subscription request.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Wallet to bill.
    pub wallet_id: WalletId,
    /// Plan to activate on completion.
    pub plan_id: PlanId,
    /// Free-form label.
    #[serde(default)]
    pub subscription_type: Option<String>,
}

/// Create an inactive, unbilled subscription.
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<Json<Subscription>, ApiError> {
    let shell = NewSubscription {
        subscription_type: body.subscription_type,
        ..NewSubscription::shell(body.wallet_id, body.plan_id)
    };
    let subscription = state.store.create_subscription(&shell).await?;

    tracing::info!(
        subscription_id = %subscription.subscription_id,
        wallet_id = %subscription.wallet_id,
        plan_id = %subscription.plan_id,
        "Subscription created"
    );
    Ok(Json(subscription))
}

/// Get a subscription.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription_id: SubscriptionId = parse_id(&subscription_id)?;
    let subscription = state
        .store
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| BillingError::not_found("subscription", subscription_id))?;
    Ok(Json(subscription))
}

/// Bill and activate a subscription.
pub async fn complete_subscription(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription_id: SubscriptionId = parse_id(&subscription_id)?;

    tracing::debug!(
        subscription_id = %subscription_id,
        service = %auth.service_name,
        "Completing subscription"
    );

    let subscription =
        subscriptions::complete_subscription(state.store.as_ref(), subscription_id).await?;
    Ok(Json(subscription))
}
