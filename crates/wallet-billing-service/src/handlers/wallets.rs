//! Wallet, ledger and wallet-scoped subscription handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use wallet_billing_core::{
    BillingError, NewWallet, PlanId, SubscriptionHistory, SubscriptionResult, TransactionKind,
    TransactionRequest, Wallet, WalletBalance, WalletId, WalletTransaction,
};
use wallet_billing_store::{ledger, subscriptions};

use super::{parse_id, split_page, PageQuery};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Open a wallet for an account.
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewWallet>,
) -> Result<Json<Wallet>, ApiError> {
    body.validate()?;
    let wallet = state.store.create_wallet(&body).await?;

    tracing::info!(
        wallet_id = %wallet.wallet_id,
        account_id = %wallet.account_id,
        "Wallet created"
    );
    Ok(Json(wallet))
}

/// Get a wallet.
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<Wallet>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let wallet = state
        .store
        .get_wallet(wallet_id)
        .await?
        .ok_or_else(|| BillingError::not_found("wallet", wallet_id))?;
    Ok(Json(wallet))
}

/// Get a wallet's balance components.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<WalletBalance>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let balance = ledger::get_balance(state.store.as_ref(), wallet_id).await?;
    Ok(Json(balance))
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<WalletTransaction>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List a wallet's ledger.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let limit = query.limit();
    let rows =
        ledger::list_transactions(state.store.as_ref(), wallet_id, limit + 1, query.offset).await?;
    let (transactions, has_more) = split_page(rows, limit);

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Post transaction request.
#[derive(Debug, Deserialize)]
pub struct PostTransactionRequest {
    /// `credit` or `debit`, any case.
    pub transaction_type: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Origin of the money, e.g. `Razorpay` or `manual`.
    pub source: String,
    /// Free-form remark.
    #[serde(default)]
    pub remark: Option<String>,
    /// Free-form extra context.
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Credit or debit a wallet.
pub async fn post_transaction(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(wallet_id): Path<String>,
    Json(body): Json<PostTransactionRequest>,
) -> Result<Json<WalletTransaction>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let kind: TransactionKind = body.transaction_type.parse()?;

    let mut request = TransactionRequest::new(wallet_id, kind, body.amount, body.source);
    request.remark = body.remark;
    request.additional_info = body.additional_info;

    tracing::debug!(
        wallet_id = %wallet_id,
        kind = %kind,
        amount = body.amount,
        service = %auth.service_name,
        "Posting wallet transaction"
    );

    let transaction = ledger::process_transaction(state.store.as_ref(), request).await?;
    Ok(Json(transaction))
}

/// Subscribe request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Plan to subscribe to.
    pub plan_id: PlanId,
}

/// Subscribe a wallet to a plan, replacing any active subscription.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(wallet_id): Path<String>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<SubscriptionResult>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;

    tracing::debug!(
        wallet_id = %wallet_id,
        plan_id = %body.plan_id,
        service = %auth.service_name,
        "Subscribing wallet"
    );

    let result = subscriptions::subscribe(state.store.as_ref(), wallet_id, body.plan_id).await?;
    Ok(Json(result))
}

/// Renew a wallet's active subscription.
pub async fn renew(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(wallet_id): Path<String>,
) -> Result<Json<SubscriptionResult>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let result = subscriptions::renew(state.store.as_ref(), wallet_id).await?;
    Ok(Json(result))
}

/// Cancel a wallet's active subscription.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(wallet_id): Path<String>,
) -> Result<Json<SubscriptionResult>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let result = subscriptions::cancel(state.store.as_ref(), wallet_id).await?;
    Ok(Json(result))
}

/// Subscription history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// History entries (newest first).
    pub history: Vec<SubscriptionHistory>,
}

/// List a wallet's subscription history.
pub async fn subscription_history(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let wallet_id: WalletId = parse_id(&wallet_id)?;
    let history = subscriptions::history(state.store.as_ref(), wallet_id).await?;
    Ok(Json(HistoryResponse { history }))
}
