//! `PostgreSQL` integration tests.
//!
//! These tests run against a real database. Set `DATABASE_URL` to a scratch
//! database; migrations are applied on connect.
//!
//! Run with: cargo test -p wallet-billing-store --test postgres -- --ignored

use futures::future::join_all;
use wallet_billing_core::{
    ErrorKind, NewAccount, NewGatewayPayment, NewPartner, NewPartnerTransaction, NewPlan,
    NewSubscription, NewWallet, PlanId, SubscriptionStatus, TransactionRequest, WalletId,
};
use wallet_billing_store::{ledger, subscriptions, PgStore, Store};

async fn connect() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PgStore::connect(&url, 10).await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");
    store
}

async fn wallet_with(store: &PgStore, monthly: i64, fixed: i64) -> WalletId {
    let account = store
        .create_account(&NewAccount {
            account_name: "Integration".into(),
            is_active: true,
            partner_id: None,
        })
        .await
        .unwrap();
    store
        .create_wallet(&NewWallet {
            account_id: account.account_id,
            monthly_balance: monthly,
            fixed_balance: fixed,
        })
        .await
        .unwrap()
        .wallet_id
}

// ============================================================================
// Schema
// ============================================================================

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_schema_is_complete() {
    let store = connect().await;
    store.verify_schema().await.unwrap();
    store.health_check().await.unwrap();
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_debit_draws_monthly_then_fixed() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 100, 50).await;

    let tx = ledger::process_transaction(&store, TransactionRequest::debit(wallet_id, 120, "manual"))
        .await
        .unwrap();
    assert_eq!((tx.previous_balance, tx.current_balance), (150, 30));

    let balance = ledger::get_balance(&store, wallet_id).await.unwrap();
    assert_eq!((balance.monthly_balance, balance.fixed_balance), (0, 30));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Needs DATABASE_URL
async fn pg_concurrent_debits_never_overdraw() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 50, 50).await;

    let attempts = (0..20).map(|_| {
        let store = store.clone();
        tokio::spawn(async move {
            ledger::process_transaction(&store, TransactionRequest::debit(wallet_id, 10, "usage"))
                .await
        })
    });
    let succeeded = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(succeeded, 10);
    let balance = ledger::get_balance(&store, wallet_id).await.unwrap();
    assert_eq!(balance.total_balance, 0);
}

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_failed_debit_writes_nothing() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 5, 0).await;

    let err = ledger::process_transaction(&store, TransactionRequest::debit(wallet_id, 6, "usage"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InsufficientFunds));
    assert!(ledger::list_transactions(&store, wallet_id, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_subscription_lifecycle() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 0, 0).await;
    let plan = store
        .create_plan(&NewPlan {
            plan_name: "Monthly".into(),
            plan_amount: 49_900,
            price: None,
            duration_in_days: 30,
            is_active: true,
        })
        .await
        .unwrap();

    let first = subscriptions::subscribe(&store, wallet_id, plan.plan_id)
        .await
        .unwrap();
    let second = subscriptions::subscribe(&store, wallet_id, plan.plan_id)
        .await
        .unwrap();
    assert_ne!(first.subscription_id, second.subscription_id);

    let renewed = subscriptions::renew(&store, wallet_id).await.unwrap();
    assert!(renewed.end_time > second.end_time);

    let cancelled = subscriptions::cancel(&store, wallet_id).await.unwrap();
    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);

    let history = subscriptions::history(&store, wallet_id).await.unwrap();
    assert_eq!(history.len(), 5);
}

async fn monthly_plan(store: &PgStore, amount: i64) -> PlanId {
    store
        .create_plan(&NewPlan {
            plan_name: "Monthly".into(),
            plan_amount: amount,
            price: None,
            duration_in_days: 30,
            is_active: true,
        })
        .await
        .unwrap()
        .plan_id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Needs DATABASE_URL
async fn pg_concurrent_subscribes_leave_one_active() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 0, 0).await;
    let plan_id = monthly_plan(&store, 100).await;

    let attempts = (0..20).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { subscriptions::subscribe(&store, wallet_id, plan_id).await })
    });
    let succeeded = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();
    assert_eq!(succeeded, 20);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subscription WHERE wallet_id = $1 AND is_active",
    )
    .bind(wallet_id.get())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(active, 1);

    let balance = ledger::get_balance(&store, wallet_id).await.unwrap();
    assert_eq!(balance.total_balance, 2_000);
}

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_gateway_payment_redeems_once() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 0, 0).await;
    let plan_id = monthly_plan(&store, 49_900).await;
    let paid = NewGatewayPayment {
        payment_id: format!("pay_it_{wallet_id}"),
        order_id: format!("order_it_{wallet_id}"),
        wallet_id,
        plan_id,
        amount: 49_900,
    };

    subscriptions::subscribe_paid(&store, paid.clone())
        .await
        .unwrap();
    let err = subscriptions::subscribe_paid(&store, paid.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Conflict));

    let balance = ledger::get_balance(&store, wallet_id).await.unwrap();
    assert_eq!(balance.total_balance, 49_900);
    assert!(store
        .get_gateway_payment(&paid.payment_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_complete_with_insufficient_funds_rolls_back() {
    let store = connect().await;
    let wallet_id = wallet_with(&store, 10, 0).await;
    let plan = store
        .create_plan(&NewPlan {
            plan_name: "Yearly".into(),
            plan_amount: 1_000,
            price: None,
            duration_in_days: 365,
            is_active: true,
        })
        .await
        .unwrap();
    let shell = store
        .create_subscription(&NewSubscription::shell(wallet_id, plan.plan_id))
        .await
        .unwrap();

    let err = subscriptions::complete_subscription(&store, shell.subscription_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InsufficientFunds));

    let after = store
        .get_subscription(shell.subscription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, shell);
}

// ============================================================================
// Partners
// ============================================================================

#[tokio::test]
#[ignore] // Needs DATABASE_URL
async fn pg_partner_commission_references_transaction() {
    let store = connect().await;
    let email = format!("ops+{}@acme.example", unique_suffix());
    let partner = store
        .create_partner(&NewPartner {
            partner_name: "Acme Resellers".into(),
            partner_email: email.clone(),
            partner_phone: None,
            partner_address: None,
            is_active: true,
            commission_rate_bps: Some(500),
            commission_type: Some("percentage".into()),
        })
        .await
        .unwrap();

    let wallet_id = wallet_with(&store, 0, 0).await;
    let tx = ledger::process_transaction(&store, TransactionRequest::credit(wallet_id, 1_000, "Razorpay"))
        .await
        .unwrap();

    let record = store
        .create_partner_transaction(
            &NewPartnerTransaction {
                partner_id: partner.partner_id,
                transaction_id: tx.transaction_id,
                commission_amount: None,
                is_active: true,
            },
            partner.commission_for(tx.amount),
        )
        .await
        .unwrap();
    assert_eq!(record.commission_amount, 50);
    assert_eq!(record.transaction_date, tx.created_at);

    let duplicate = store
        .create_partner(&NewPartner {
            partner_name: "Copycat".into(),
            partner_email: email,
            partner_phone: None,
            partner_address: None,
            is_active: true,
            commission_rate_bps: None,
            commission_type: None,
        })
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), Some(ErrorKind::Conflict));
}

fn unique_suffix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(0))
}
