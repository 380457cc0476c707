//! The wallet ledger.
//!
//! Every balance change goes through [`post`]: lock the wallet, apply the
//! two-tier arithmetic, write the new balances and append one immutable
//! [`WalletTransaction`]. All of it happens inside one [`UnitOfWork`], so a
//! failure anywhere leaves no trace.

use chrono::Utc;
use tracing::{info, warn};

use wallet_billing_core::{
    BillingError, NewWalletTransaction, TransactionRequest, WalletBalance, WalletId,
    WalletTransaction,
};

use crate::error::Result;
use crate::{Store, UnitOfWork};

/// Post one credit or debit in its own unit of work.
///
/// # Errors
///
/// - `InvalidArgument` if the amount is not positive or the source is blank
/// - `NotFound` if the wallet does not exist
/// - `InsufficientFunds` if a debit exceeds the wallet's total balance
pub async fn process_transaction(
    store: &dyn Store,
    request: TransactionRequest,
) -> Result<WalletTransaction> {
    request.validate()?;

    let mut uow = store.begin().await?;
    let result = post(uow.as_mut(), &request).await;
    let transaction = match result {
        Ok(transaction) => transaction,
        Err(err) => {
            warn!(
                wallet_id = %request.wallet_id,
                kind = %request.kind,
                amount = request.amount,
                error = %err,
                "Wallet transaction rejected"
            );
            return Err(err);
        }
    };
    uow.commit().await?;

    info!(
        wallet_id = %transaction.wallet_id,
        transaction_id = %transaction.transaction_id,
        kind = %transaction.transaction_type,
        amount = transaction.amount,
        balance = transaction.current_balance,
        "Wallet transaction posted"
    );
    Ok(transaction)
}

/// Post one credit or debit inside a caller's unit of work.
///
/// Takes the wallet lock if the unit does not already hold it. Nothing is
/// visible until the caller commits.
///
/// # Errors
///
/// Same as [`process_transaction`].
pub async fn post(
    uow: &mut dyn UnitOfWork,
    request: &TransactionRequest,
) -> Result<WalletTransaction> {
    request.validate()?;

    let wallet = uow
        .lock_wallet(request.wallet_id)
        .await?
        .ok_or_else(|| BillingError::not_found("wallet", request.wallet_id))?;

    let before = wallet.balances();
    let after = before.apply(request.kind, request.amount)?;
    let now = Utc::now();

    uow.update_wallet_balances(request.wallet_id, after, now)
        .await?;
    uow.insert_wallet_transaction(NewWalletTransaction {
        wallet_id: request.wallet_id,
        transaction_type: request.kind,
        amount: request.amount,
        previous_balance: before.total(),
        current_balance: after.total(),
        source: request.source.clone(),
        remark: request.remark.clone(),
        additional_info: request.additional_info.clone(),
        created_at: now,
    })
    .await
}

/// Read a wallet's balance components without locking.
///
/// # Errors
///
/// Returns `NotFound` if the wallet does not exist.
pub async fn get_balance(store: &dyn Store, wallet_id: WalletId) -> Result<WalletBalance> {
    let wallet = store
        .get_wallet(wallet_id)
        .await?
        .ok_or_else(|| BillingError::not_found("wallet", wallet_id))?;
    Ok(WalletBalance::from(&wallet))
}

/// List a wallet's ledger, newest first.
///
/// # Errors
///
/// Returns `NotFound` if the wallet does not exist.
pub async fn list_transactions(
    store: &dyn Store,
    wallet_id: WalletId,
    limit: usize,
    offset: usize,
) -> Result<Vec<WalletTransaction>> {
    if store.get_wallet(wallet_id).await?.is_none() {
        return Err(BillingError::not_found("wallet", wallet_id).into());
    }
    store
        .list_wallet_transactions(wallet_id, limit, offset)
        .await
}
