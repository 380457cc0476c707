//! Storage layer, ledger engine and subscription lifecycle for wallet-billing.
//!
//! This crate provides persistent storage for partners, accounts, wallets, plans and
//! subscriptions, plus the two pieces of business logic that run on top of it:
//!
//! - [`ledger`]: the only code path that changes a wallet balance.
//! - [`subscriptions`]: subscribe / renew / cancel / complete, charging through the ledger.
//!
//! # Architecture
//!
//! [`Store`] covers plain CRUD. Anything that must be atomic goes through a
//! [`UnitOfWork`] obtained from [`Store::begin`]: the engines lock the wallet,
//! read, write and finally [`UnitOfWork::commit`]. Dropping a unit of work
//! without committing rolls every staged write back.
//!
//! Two backends implement the traits:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, wallet lock = `SELECT ... FOR UPDATE`.
//! - [`MemoryStore`]: in-process tables, wallet lock = one `tokio` mutex per wallet.
//!
//! # Example
//!
//! ```no_run
//! use wallet_billing_core::{NewAccount, NewWallet, TransactionRequest};
//! use wallet_billing_store::{ledger, MemoryStore, Store};
//!
//! # async fn example() -> wallet_billing_store::Result<()> {
//! let store = MemoryStore::new();
//! let account = store
//!     .create_account(&NewAccount { account_name: "Acme".into(), is_active: true, partner_id: None })
//!     .await?;
//! let wallet = store
//!     .create_wallet(&NewWallet { account_id: account.account_id, monthly_balance: 100, fixed_balance: 50 })
//!     .await?;
//!
//! let tx = ledger::process_transaction(&store, TransactionRequest::debit(wallet.wallet_id, 120, "manual")).await?;
//! assert_eq!(tx.current_balance, 30);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod subscriptions;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use wallet_billing_core::{
    Account, AccountId, Balances, GatewayPayment, NewAccount, NewHistoryEntry, NewPartner,
    NewPartnerTransaction, NewPlan, NewPlanFeature, NewSettlement, NewSubscription, NewWallet,
    NewWalletTransaction, Partner, PartnerId, PartnerTransaction, Plan, PlanFeature, PlanId,
    Settlement, Subscription, SubscriptionHistory, SubscriptionId, TransactionId, Wallet,
    WalletId, WalletTransaction,
};

/// The storage trait defining all plain database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (`PostgreSQL`, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Partner / Account Operations
    // =========================================================================

    /// Insert a partner.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is already registered.
    async fn create_partner(&self, partner: &NewPartner) -> Result<Partner>;

    /// Get a partner by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_partner(&self, partner_id: PartnerId) -> Result<Option<Partner>>;

    /// List partners ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_partners(&self, limit: usize, offset: usize) -> Result<Vec<Partner>>;

    /// Insert an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the referenced partner does not exist.
    async fn create_account(&self, account: &NewAccount) -> Result<Account>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>>;

    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Insert a wallet with its opening balances.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    async fn create_wallet(&self, wallet: &NewWallet) -> Result<Wallet>;

    /// Get a wallet by ID (non-locking read).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>>;

    /// Get a ledger record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_wallet_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<WalletTransaction>>;

    /// List ledger records for a wallet, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_wallet_transactions(
        &self,
        wallet_id: WalletId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>>;

    // =========================================================================
    // Plan Operations
    // =========================================================================

    /// Insert a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan>;

    /// Get a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>>;

    /// List plans ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>>;

    /// Attach a feature to a plan.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the plan does not exist.
    async fn create_plan_feature(
        &self,
        plan_id: PlanId,
        feature: &NewPlanFeature,
    ) -> Result<PlanFeature>;

    /// List a plan's features.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_plan_features(&self, plan_id: PlanId) -> Result<Vec<PlanFeature>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Insert a subscription row as given.
    ///
    /// Only used for inactive/unbilled shells; lifecycle transitions go through
    /// [`subscriptions`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the wallet or plan does not exist.
    async fn create_subscription(&self, subscription: &NewSubscription) -> Result<Subscription>;

    /// Get a subscription by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>>;

    /// List a wallet's subscription history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_subscription_history(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<SubscriptionHistory>>;

    // =========================================================================
    // Partner Payout Operations
    // =========================================================================

    /// Record a commission; `transaction_date` is copied from the wallet transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the partner or the wallet transaction does not exist.
    async fn create_partner_transaction(
        &self,
        record: &NewPartnerTransaction,
        commission_amount: i64,
    ) -> Result<PartnerTransaction>;

    /// Record a settlement.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the partner or commission record does not exist.
    async fn create_settlement(&self, settlement: &NewSettlement) -> Result<Settlement>;

    // =========================================================================
    // Gateway Payment Operations
    // =========================================================================

    /// Look up a redeemed gateway payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_gateway_payment(&self, payment_id: &str) -> Result<Option<GatewayPayment>>;

    // =========================================================================
    // Units of Work
    // =========================================================================

    /// Open an atomic unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction cannot be started.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not answer.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// One atomic unit of work.
///
/// Reads see the unit's own writes. Nothing becomes visible to other units
/// until [`UnitOfWork::commit`]; dropping the unit discards everything.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Take the wallet's exclusive lock and read it.
    ///
    /// The lock is held until the unit commits or is dropped. Locking the same
    /// wallet twice in one unit is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn lock_wallet(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>>;

    /// Overwrite a locked wallet's balances.
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet is not locked by this unit or the write fails.
    async fn update_wallet_balances(
        &mut self,
        wallet_id: WalletId,
        balances: Balances,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Append a ledger record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_wallet_transaction(
        &mut self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction>;

    /// Read a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_plan(&mut self, plan_id: PlanId) -> Result<Option<Plan>>;

    /// Read a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_subscription(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>>;

    /// Find the wallet's active subscription. Call after [`UnitOfWork::lock_wallet`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_active_subscription(
        &mut self,
        wallet_id: WalletId,
    ) -> Result<Option<Subscription>>;

    /// Insert a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_subscription(&mut self, subscription: NewSubscription)
        -> Result<Subscription>;

    /// Overwrite a subscription's mutable fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<()>;

    /// Append a history row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_history(&mut self, entry: NewHistoryEntry) -> Result<SubscriptionHistory>;

    /// Record a redeemed gateway payment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the payment or its order was already redeemed.
    async fn insert_gateway_payment(&mut self, payment: GatewayPayment) -> Result<()>;

    /// Make every staged write visible and release the wallet locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    async fn commit(self: Box<Self>) -> Result<()>;
}
