//! Account management handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use wallet_billing_core::{Account, AccountId, BillingError, NewAccount};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Create an account, optionally attached to a partner.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewAccount>,
) -> Result<Json<Account>, ApiError> {
    body.validate()?;
    let account = state.store.create_account(&body).await?;

    tracing::info!(
        account_id = %account.account_id,
        partner_id = ?account.partner_id,
        "Account created"
    );
    Ok(Json(account))
}

/// Get an account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account_id: AccountId = parse_id(&account_id)?;
    let account = state
        .store
        .get_account(account_id)
        .await?
        .ok_or_else(|| BillingError::not_found("account", account_id))?;
    Ok(Json(account))
}
