//! Subscription lifecycle.
//!
//! Each transition runs in one unit of work that first takes the wallet lock,
//! so two transitions on the same wallet never interleave. Money moves through
//! [`ledger::post`] inside the same unit; a rejected charge rolls the whole
//! transition back.

use chrono::{DateTime, Utc};
use tracing::{field, info, instrument, warn, Span};

use wallet_billing_core::{
    BillingError, HistoryStatus, NewGatewayPayment, NewHistoryEntry, NewSubscription, Plan,
    PlanId, Subscription,
    SubscriptionHistory, SubscriptionId, SubscriptionResult, SubscriptionStatus,
    TransactionKind, TransactionRequest, WalletId, AUTO_CANCEL_COMMENT, COMPLETED_COMMENT,
    RENEWED_COMMENT, SUBSCRIBED_COMMENT, SUBSCRIPTION_SOURCE, USER_CANCELLED_COMMENT,
};

use crate::error::Result;
use crate::{ledger, Store, UnitOfWork};

/// Subscribe a wallet to a plan, replacing any active subscription.
///
/// The plan amount is credited to the wallet (the payment was collected by
/// the gateway) and the new subscription starts now.
///
/// # Errors
///
/// - `NotFound` if the plan or wallet does not exist, or the plan is inactive
/// - `InvalidAmount` if the plan period runs past the supported date range
/// - `Conflict` if a concurrent transition won
#[instrument(skip_all, fields(wallet_id = %wallet_id, plan_id = %plan_id))]
pub async fn subscribe(
    store: &dyn Store,
    wallet_id: WalletId,
    plan_id: PlanId,
) -> Result<SubscriptionResult> {
    let mut uow = store.begin().await?;
    let result = subscribe_in(uow.as_mut(), wallet_id, plan_id).await;
    let result = finish(uow, result, "subscribe").await?;

    info!(subscription_id = %result.subscription_id, "Wallet subscribed");
    Ok(result)
}

/// Subscribe a wallet to the plan a verified gateway payment paid for.
///
/// Same as [`subscribe`], plus the payment is recorded in the same unit of
/// work, so each payment (and each order) subscribes a wallet at most once.
///
/// # Errors
///
/// - `NotFound` if the plan or wallet does not exist, or the plan is inactive
/// - `Conflict` if the payment or its order was already redeemed
#[instrument(
    skip_all,
    fields(
        wallet_id = %payment.wallet_id,
        plan_id = %payment.plan_id,
        payment_id = %payment.payment_id,
    )
)]
pub async fn subscribe_paid(
    store: &dyn Store,
    payment: NewGatewayPayment,
) -> Result<SubscriptionResult> {
    let mut uow = store.begin().await?;
    let result = subscribe_paid_in(uow.as_mut(), payment).await;
    let result = finish(uow, result, "subscribe_paid").await?;

    info!(
        subscription_id = %result.subscription_id,
        "Wallet subscribed from gateway payment"
    );
    Ok(result)
}

/// Extend the wallet's active subscription by one plan period.
///
/// The new end is the previous end plus the period, so renewing early never
/// loses time. The plan amount is credited to the wallet.
///
/// # Errors
///
/// - `NotFound` if the wallet has no active subscription
/// - `InvalidAmount` if the new end falls outside the supported date range
#[instrument(skip_all, fields(wallet_id = %wallet_id))]
pub async fn renew(store: &dyn Store, wallet_id: WalletId) -> Result<SubscriptionResult> {
    let mut uow = store.begin().await?;
    let result = renew_in(uow.as_mut(), wallet_id).await;
    let result = finish(uow, result, "renew").await?;

    info!(
        subscription_id = %result.subscription_id,
        end_time = %result.end_time,
        "Subscription renewed"
    );
    Ok(result)
}

/// Cancel the wallet's active subscription, ending it now. No money moves.
///
/// # Errors
///
/// - `NotFound` if the wallet has no active subscription
#[instrument(skip_all, fields(wallet_id = %wallet_id))]
pub async fn cancel(store: &dyn Store, wallet_id: WalletId) -> Result<SubscriptionResult> {
    let mut uow = store.begin().await?;
    let result = cancel_in(uow.as_mut(), wallet_id).await;
    let result = finish(uow, result, "cancel").await?;

    info!(subscription_id = %result.subscription_id, "Subscription cancelled");
    Ok(result)
}

/// Bill and activate a subscription created as an inactive shell.
///
/// Debits the plan amount from the wallet, cancels any other active
/// subscription on the wallet, and stamps a fresh window. Completing a
/// subscription that is already billed and active is a no-op.
///
/// # Errors
///
/// - `NotFound` if the subscription, its plan or its wallet does not exist
/// - `InsufficientFunds` if the wallet cannot cover the plan amount; nothing changes
#[instrument(
    skip_all,
    fields(subscription_id = %subscription_id, wallet_id = field::Empty)
)]
pub async fn complete_subscription(
    store: &dyn Store,
    subscription_id: SubscriptionId,
) -> Result<Subscription> {
    let mut uow = store.begin().await?;
    let result = complete_in(uow.as_mut(), subscription_id).await;
    let subscription = finish(uow, result, "complete").await?;

    info!("Subscription completed");
    Ok(subscription)
}

/// A wallet's subscription history, newest first.
///
/// # Errors
///
/// Returns `NotFound` if the wallet does not exist.
pub async fn history(store: &dyn Store, wallet_id: WalletId) -> Result<Vec<SubscriptionHistory>> {
    if store.get_wallet(wallet_id).await?.is_none() {
        return Err(BillingError::not_found("wallet", wallet_id).into());
    }
    store.list_subscription_history(wallet_id).await
}

/// Commit on success; log and roll back (by dropping the unit) on failure.
///
/// Runs inside the caller's span, which carries the wallet and subscription.
async fn finish<T: Send>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T>,
    operation: &'static str,
) -> Result<T> {
    let outcome = match result {
        Ok(value) => uow.commit().await.map(|()| value),
        Err(err) => Err(err),
    };
    if let Err(err) = &outcome {
        warn!(operation, error = %err, "Subscription transition rejected");
    }
    outcome
}

// ============================================================================
// Transitions
// ============================================================================

async fn subscribe_in(
    uow: &mut dyn UnitOfWork,
    wallet_id: WalletId,
    plan_id: PlanId,
) -> Result<SubscriptionResult> {
    let plan = uow
        .get_plan(plan_id)
        .await?
        .ok_or_else(|| BillingError::not_found("plan", plan_id))?;
    if !plan.is_active {
        return Err(BillingError::PlanInactive {
            plan_id: plan_id.get(),
        }
        .into());
    }
    lock(uow, wallet_id).await?;

    let now = Utc::now();
    if let Some(existing) = uow.find_active_subscription(wallet_id).await? {
        deactivate(uow, existing, now).await?;
    }

    let subscription = uow
        .insert_subscription(NewSubscription::active(wallet_id, &plan, now)?)
        .await?;
    charge(uow, &subscription, &plan, TransactionKind::Credit).await?;
    uow.insert_history(NewHistoryEntry::for_subscription(
        &subscription,
        plan_id,
        HistoryStatus::Activated,
        SUBSCRIBED_COMMENT,
        now,
    ))
    .await?;

    Ok(active_result(&subscription, now, "Subscription successful"))
}

async fn subscribe_paid_in(
    uow: &mut dyn UnitOfWork,
    payment: NewGatewayPayment,
) -> Result<SubscriptionResult> {
    let result = subscribe_in(uow, payment.wallet_id, payment.plan_id).await?;
    uow.insert_gateway_payment(payment.redeemed(result.subscription_id, Utc::now()))
        .await?;
    Ok(result)
}

async fn renew_in(uow: &mut dyn UnitOfWork, wallet_id: WalletId) -> Result<SubscriptionResult> {
    lock(uow, wallet_id).await?;
    let mut subscription = active(uow, wallet_id).await?;
    let plan = uow
        .get_plan(subscription.plan_id)
        .await?
        .ok_or_else(|| BillingError::not_found("plan", subscription.plan_id))?;

    let now = Utc::now();
    charge(uow, &subscription, &plan, TransactionKind::Credit).await?;
    subscription.extend(&plan, now)?;
    uow.update_subscription(&subscription).await?;
    uow.insert_history(NewHistoryEntry::for_subscription(
        &subscription,
        subscription.plan_id,
        HistoryStatus::Renewed,
        RENEWED_COMMENT,
        now,
    ))
    .await?;

    let mut result = active_result(&subscription, now, RENEWED_COMMENT);
    result.start_time = None;
    Ok(result)
}

async fn cancel_in(uow: &mut dyn UnitOfWork, wallet_id: WalletId) -> Result<SubscriptionResult> {
    lock(uow, wallet_id).await?;
    let mut subscription = active(uow, wallet_id).await?;

    let now = Utc::now();
    subscription.cancel(now);
    uow.update_subscription(&subscription).await?;
    uow.insert_history(NewHistoryEntry::for_subscription(
        &subscription,
        subscription.plan_id,
        HistoryStatus::Cancelled,
        USER_CANCELLED_COMMENT,
        now,
    ))
    .await?;

    Ok(SubscriptionResult {
        subscription_id: subscription.subscription_id,
        wallet_id,
        plan_id: subscription.plan_id,
        status: SubscriptionStatus::Cancelled,
        start_time: None,
        end_time: now,
        message: "Subscription cancelled".into(),
    })
}

async fn complete_in(
    uow: &mut dyn UnitOfWork,
    subscription_id: SubscriptionId,
) -> Result<Subscription> {
    let shell = uow
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| BillingError::not_found("subscription", subscription_id))?;
    Span::current().record("wallet_id", field::display(shell.wallet_id));
    lock(uow, shell.wallet_id).await?;

    // Re-read under the wallet lock.
    let mut subscription = uow
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| BillingError::not_found("subscription", subscription_id))?;
    if subscription.is_billed && subscription.is_active {
        return Ok(subscription);
    }

    let plan = uow
        .get_plan(subscription.plan_id)
        .await?
        .ok_or_else(|| BillingError::not_found("plan", subscription.plan_id))?;

    let now = Utc::now();
    if let Some(existing) = uow.find_active_subscription(subscription.wallet_id).await? {
        if existing.subscription_id != subscription_id {
            deactivate(uow, existing, now).await?;
        }
    }
    charge(uow, &subscription, &plan, TransactionKind::Debit).await?;

    subscription.activate(&plan, now)?;
    uow.update_subscription(&subscription).await?;
    uow.insert_history(NewHistoryEntry::for_subscription(
        &subscription,
        subscription.plan_id,
        HistoryStatus::Activated,
        COMPLETED_COMMENT,
        now,
    ))
    .await?;

    Ok(subscription)
}

// ============================================================================
// Helpers
// ============================================================================

async fn lock(uow: &mut dyn UnitOfWork, wallet_id: WalletId) -> Result<()> {
    uow.lock_wallet(wallet_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| BillingError::not_found("wallet", wallet_id).into())
}

async fn active(uow: &mut dyn UnitOfWork, wallet_id: WalletId) -> Result<Subscription> {
    uow.find_active_subscription(wallet_id)
        .await?
        .ok_or_else(|| {
            BillingError::NoActiveSubscription {
                wallet_id: wallet_id.get(),
            }
            .into()
        })
}

/// Auto-cancel a subscription being replaced. The row keeps its end time.
async fn deactivate(
    uow: &mut dyn UnitOfWork,
    mut subscription: Subscription,
    now: DateTime<Utc>,
) -> Result<()> {
    subscription.is_active = false;
    uow.update_subscription(&subscription).await?;
    uow.insert_history(NewHistoryEntry::for_subscription(
        &subscription,
        subscription.plan_id,
        HistoryStatus::Cancelled,
        AUTO_CANCEL_COMMENT,
        now,
    ))
    .await?;
    Ok(())
}

/// Move the plan amount through the ledger. Free plans move nothing.
async fn charge(
    uow: &mut dyn UnitOfWork,
    subscription: &Subscription,
    plan: &Plan,
    kind: TransactionKind,
) -> Result<()> {
    if plan.plan_amount == 0 {
        return Ok(());
    }
    let request = TransactionRequest::new(
        subscription.wallet_id,
        kind,
        plan.plan_amount,
        SUBSCRIPTION_SOURCE,
    )
    .with_remark(format!("Subscription for plan {}", plan.plan_id))
    .with_additional_info(format!("subscription_id={}", subscription.subscription_id));
    ledger::post(uow, &request).await?;
    Ok(())
}

fn active_result(
    subscription: &Subscription,
    now: DateTime<Utc>,
    message: &str,
) -> SubscriptionResult {
    SubscriptionResult {
        subscription_id: subscription.subscription_id,
        wallet_id: subscription.wallet_id,
        plan_id: subscription.plan_id,
        status: SubscriptionStatus::Active,
        start_time: subscription.start_time,
        end_time: subscription.end_time.unwrap_or(now),
        message: message.into(),
    }
}
