//! Partner commission and settlement handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use wallet_billing_core::{
    BillingError, NewPartnerTransaction, NewSettlement, PartnerTransaction, Settlement,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Record a partner's commission on a wallet transaction.
///
/// Without an explicit `commission_amount` the partner's rate is applied to
/// the transaction amount.
pub async fn create_partner_transaction(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewPartnerTransaction>,
) -> Result<Json<PartnerTransaction>, ApiError> {
    let commission_amount = match body.commission_amount {
        Some(amount) if amount < 0 => {
            return Err(BillingError::InvalidAmount(format!(
                "commission_amount must be non-negative, got {amount}"
            ))
            .into());
        }
        Some(amount) => amount,
        None => {
            let partner = state
                .store
                .get_partner(body.partner_id)
                .await?
                .ok_or_else(|| BillingError::not_found("partner", body.partner_id))?;
            let transaction = state
                .store
                .get_wallet_transaction(body.transaction_id)
                .await?
                .ok_or_else(|| BillingError::not_found("wallet transaction", body.transaction_id))?;
            partner.commission_for(transaction.amount)
        }
    };

    let record = state
        .store
        .create_partner_transaction(&body, commission_amount)
        .await?;

    tracing::info!(
        partner_id = %record.partner_id,
        transaction_id = %record.transaction_id,
        commission_amount = record.commission_amount,
        "Partner commission recorded"
    );
    Ok(Json(record))
}

/// Record a settlement against a commission.
pub async fn create_settlement(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewSettlement>,
) -> Result<Json<Settlement>, ApiError> {
    body.validate()?;
    let settlement = state.store.create_settlement(&body).await?;

    tracing::info!(
        settlement_id = %settlement.settlement_id,
        partner_id = %settlement.partner_id,
        amount = settlement.settlement_amount,
        status = settlement.settlement_status.as_str(),
        "Settlement recorded"
    );
    Ok(Json(settlement))
}
