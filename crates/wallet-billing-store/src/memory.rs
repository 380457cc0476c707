//! In-memory storage backend.
//!
//! Tables live behind one `RwLock`. Every wallet has its own async mutex that a
//! unit of work holds from `lock_wallet` until it commits or is dropped. Writes
//! made inside a unit are staged and applied together at commit, so dropping a
//! unit discards them.
//!
//! The constraints the Postgres schema enforces (foreign keys, unique partner
//! email, one active subscription per wallet, one redemption per gateway
//! payment) are checked here by hand so both backends fail the same way.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use wallet_billing_core::{
    Account, AccountId, Balances, BillingError, FeatureId, GatewayPayment, HistoryId, NewAccount,
    NewHistoryEntry, NewPartner, NewPartnerTransaction, NewPlan, NewPlanFeature, NewSettlement,
    NewSubscription, NewWallet, NewWalletTransaction, Partner, PartnerId, PartnerTransaction,
    PartnerTransactionId, Plan, PlanFeature, PlanId, Settlement, SettlementId, Subscription,
    SubscriptionHistory, SubscriptionId, TransactionId, Wallet, WalletId, WalletTransaction,
};

use crate::error::{Result, StoreError};
use crate::schema::{clamp_limit, table};
use crate::{Store, UnitOfWork};

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    partners: BTreeMap<PartnerId, Partner>,
    accounts: BTreeMap<AccountId, Account>,
    wallets: BTreeMap<WalletId, Wallet>,
    transactions: BTreeMap<TransactionId, WalletTransaction>,
    plans: BTreeMap<PlanId, Plan>,
    features: BTreeMap<FeatureId, PlanFeature>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    history: BTreeMap<HistoryId, SubscriptionHistory>,
    partner_transactions: BTreeMap<PartnerTransactionId, PartnerTransaction>,
    settlements: BTreeMap<SettlementId, Settlement>,
    payments: BTreeMap<String, GatewayPayment>,
}

impl Tables {
    /// The committed payment that `payment` would duplicate, by payment or order ID.
    fn redeemed(&self, payment: &GatewayPayment) -> Option<&GatewayPayment> {
        self.payments.get(&payment.payment_id).or_else(|| {
            self.payments
                .values()
                .find(|p| p.order_id == payment.order_id)
        })
    }

    /// Next value of a table's serial; values are never reused, even on rollback.
    fn next_id(&mut self, table: &'static str) -> i64 {
        let next = self.sequences.entry(table).or_insert(0);
        *next += 1;
        *next
    }
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    wallet_locks: Mutex<HashMap<WalletId, Arc<AsyncMutex<()>>>>,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }

    fn wallet_lock(&self, wallet_id: WalletId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self.wallet_locks.lock().map_err(|_| poisoned())?;
        Ok(Arc::clone(locks.entry(wallet_id).or_default()))
    }
}

fn poisoned() -> StoreError {
    StoreError::Database("memory store lock poisoned".into())
}

/// In-process store, used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_partner(&self, partner: &NewPartner) -> Result<Partner> {
        let mut tables = self.shared.write()?;
        if tables
            .partners
            .values()
            .any(|p| p.partner_email == partner.partner_email)
        {
            return Err(StoreError::Conflict(format!(
                "partner email already registered: {}",
                partner.partner_email
            )));
        }

        let now = Utc::now();
        let partner_id = PartnerId::new(tables.next_id(table::PARTNER));
        let record = Partner {
            partner_id,
            partner_name: partner.partner_name.clone(),
            partner_email: partner.partner_email.clone(),
            partner_phone: partner.partner_phone.clone(),
            partner_address: partner.partner_address.clone(),
            is_active: partner.is_active,
            commission_rate_bps: partner.commission_rate_bps,
            commission_type: partner.commission_type.clone(),
            onboarding_date: now,
            created_at: now,
            updated_at: now,
        };
        tables.partners.insert(partner_id, record.clone());
        Ok(record)
    }

    async fn get_partner(&self, partner_id: PartnerId) -> Result<Option<Partner>> {
        Ok(self.shared.read()?.partners.get(&partner_id).cloned())
    }

    async fn list_partners(&self, limit: usize, offset: usize) -> Result<Vec<Partner>> {
        Ok(self
            .shared
            .read()?
            .partners
            .values()
            .skip(offset)
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let mut tables = self.shared.write()?;
        if let Some(partner_id) = account.partner_id {
            if !tables.partners.contains_key(&partner_id) {
                return Err(BillingError::not_found("partner", partner_id).into());
            }
        }

        let account_id = AccountId::new(tables.next_id(table::ACCOUNT));
        let record = Account {
            account_id,
            account_name: account.account_name.clone(),
            is_active: account.is_active,
            partner_id: account.partner_id,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account_id, record.clone());
        Ok(record)
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        Ok(self.shared.read()?.accounts.get(&account_id).cloned())
    }

    async fn create_wallet(&self, wallet: &NewWallet) -> Result<Wallet> {
        let mut tables = self.shared.write()?;
        if !tables.accounts.contains_key(&wallet.account_id) {
            return Err(BillingError::not_found("account", wallet.account_id).into());
        }

        let wallet_id = WalletId::new(tables.next_id(table::WALLET));
        let record = Wallet {
            wallet_id,
            account_id: wallet.account_id,
            monthly_balance: wallet.monthly_balance,
            fixed_balance: wallet.fixed_balance,
            updated_at: Utc::now(),
        };
        tables.wallets.insert(wallet_id, record.clone());
        Ok(record)
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        Ok(self.shared.read()?.wallets.get(&wallet_id).cloned())
    }

    async fn get_wallet_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<WalletTransaction>> {
        Ok(self.shared.read()?.transactions.get(&transaction_id).cloned())
    }

    async fn list_wallet_transactions(
        &self,
        wallet_id: WalletId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .shared
            .read()?
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.wallet_id == wallet_id)
            .skip(offset)
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan> {
        let mut tables = self.shared.write()?;
        let now = Utc::now();
        let plan_id = PlanId::new(tables.next_id(table::PLAN));
        let record = Plan {
            plan_id,
            plan_name: plan.plan_name.clone(),
            plan_amount: plan.plan_amount,
            price: plan.effective_price(),
            duration_in_days: plan.duration_in_days,
            is_active: plan.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.plans.insert(plan_id, record.clone());
        Ok(record)
    }

    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>> {
        Ok(self.shared.read()?.plans.get(&plan_id).cloned())
    }

    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>> {
        Ok(self
            .shared
            .read()?
            .plans
            .values()
            .filter(|plan| !active_only || plan.is_active)
            .cloned()
            .collect())
    }

    async fn create_plan_feature(
        &self,
        plan_id: PlanId,
        feature: &NewPlanFeature,
    ) -> Result<PlanFeature> {
        let mut tables = self.shared.write()?;
        if !tables.plans.contains_key(&plan_id) {
            return Err(BillingError::not_found("plan", plan_id).into());
        }

        let feature_id = FeatureId::new(tables.next_id(table::PLAN_FEATURE));
        let record = PlanFeature {
            feature_id,
            plan_id,
            feature_name: feature.feature_name.clone(),
            feature_description: feature.feature_description.clone(),
            feature_category: feature.feature_category.clone(),
            is_active: feature.is_active,
            created_at: Utc::now(),
        };
        tables.features.insert(feature_id, record.clone());
        Ok(record)
    }

    async fn list_plan_features(&self, plan_id: PlanId) -> Result<Vec<PlanFeature>> {
        Ok(self
            .shared
            .read()?
            .features
            .values()
            .filter(|f| f.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn create_subscription(&self, subscription: &NewSubscription) -> Result<Subscription> {
        let mut tables = self.shared.write()?;
        if !tables.wallets.contains_key(&subscription.wallet_id) {
            return Err(BillingError::not_found("wallet", subscription.wallet_id).into());
        }
        if !tables.plans.contains_key(&subscription.plan_id) {
            return Err(BillingError::not_found("plan", subscription.plan_id).into());
        }
        if subscription.is_active
            && tables
                .subscriptions
                .values()
                .any(|s| s.wallet_id == subscription.wallet_id && s.is_active)
        {
            return Err(active_conflict(subscription.wallet_id));
        }

        let subscription_id = SubscriptionId::new(tables.next_id(table::SUBSCRIPTION));
        let record = subscription.clone().with_id(subscription_id);
        tables.subscriptions.insert(subscription_id, record.clone());
        Ok(record)
    }

    async fn get_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        Ok(self
            .shared
            .read()?
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn list_subscription_history(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<SubscriptionHistory>> {
        Ok(self
            .shared
            .read()?
            .history
            .values()
            .rev()
            .filter(|h| h.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn create_partner_transaction(
        &self,
        record: &NewPartnerTransaction,
        commission_amount: i64,
    ) -> Result<PartnerTransaction> {
        let mut tables = self.shared.write()?;
        if !tables.partners.contains_key(&record.partner_id) {
            return Err(BillingError::not_found("partner", record.partner_id).into());
        }
        let transaction_date = tables
            .transactions
            .get(&record.transaction_id)
            .map(|tx| tx.created_at)
            .ok_or_else(|| BillingError::not_found("wallet transaction", record.transaction_id))?;

        let partner_transaction_id =
            PartnerTransactionId::new(tables.next_id(table::PARTNER_TRANSACTION));
        let created = PartnerTransaction {
            partner_transaction_id,
            partner_id: record.partner_id,
            transaction_id: record.transaction_id,
            is_active: record.is_active,
            commission_amount,
            transaction_date,
            created_at: Utc::now(),
        };
        tables
            .partner_transactions
            .insert(partner_transaction_id, created.clone());
        Ok(created)
    }

    async fn create_settlement(&self, settlement: &NewSettlement) -> Result<Settlement> {
        let mut tables = self.shared.write()?;
        if !tables.partners.contains_key(&settlement.partner_id) {
            return Err(BillingError::not_found("partner", settlement.partner_id).into());
        }
        if !tables
            .partner_transactions
            .contains_key(&settlement.partner_transaction_id)
        {
            return Err(BillingError::not_found(
                "partner transaction",
                settlement.partner_transaction_id,
            )
            .into());
        }

        let now = Utc::now();
        let settlement_id = SettlementId::new(tables.next_id(table::SETTLEMENT));
        let record = Settlement {
            settlement_id,
            partner_id: settlement.partner_id,
            partner_transaction_id: settlement.partner_transaction_id,
            settlement_status: settlement.settlement_status,
            settlement_date: settlement.settlement_date,
            settlement_amount: settlement.settlement_amount,
            created_at: now,
            updated_at: now,
        };
        tables.settlements.insert(settlement_id, record.clone());
        Ok(record)
    }

    async fn get_gateway_payment(&self, payment_id: &str) -> Result<Option<GatewayPayment>> {
        Ok(self.shared.read()?.payments.get(payment_id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            guards: HashMap::new(),
            wallets: HashMap::new(),
            subscriptions: BTreeMap::new(),
            transactions: Vec::new(),
            history: Vec::new(),
            payments: Vec::new(),
        }))
    }
}

fn payment_conflict(payment: &GatewayPayment) -> StoreError {
    StoreError::Conflict(format!(
        "payment {} for order {} was already redeemed",
        payment.payment_id, payment.order_id
    ))
}

fn active_conflict(wallet_id: WalletId) -> StoreError {
    StoreError::Conflict(format!(
        "wallet {wallet_id} already has an active subscription"
    ))
}

/// A unit of work over [`MemoryStore`].
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    guards: HashMap<WalletId, OwnedMutexGuard<()>>,
    wallets: HashMap<WalletId, Wallet>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    transactions: Vec<WalletTransaction>,
    history: Vec<SubscriptionHistory>,
    payments: Vec<GatewayPayment>,
}

impl MemoryUnitOfWork {
    /// The wallet's active subscription as this unit sees it (staged rows win).
    fn active_for(
        &self,
        wallet_id: WalletId,
        except: Option<SubscriptionId>,
    ) -> Result<Option<Subscription>> {
        let tables = self.shared.read()?;
        let committed = tables
            .subscriptions
            .values()
            .filter(|s| !self.subscriptions.contains_key(&s.subscription_id));
        Ok(self
            .subscriptions
            .values()
            .chain(committed)
            .filter(|s| s.wallet_id == wallet_id && s.is_active)
            .find(|s| Some(s.subscription_id) != except)
            .cloned())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_wallet(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        if !self.guards.contains_key(&wallet_id) {
            // Unknown wallets get no lock entry; wallets are never deleted.
            if !self.shared.read()?.wallets.contains_key(&wallet_id) {
                return Ok(None);
            }
            let lock = self.shared.wallet_lock(wallet_id)?;
            let guard = lock.lock_owned().await;
            self.guards.insert(wallet_id, guard);
        }

        if let Some(wallet) = self.wallets.get(&wallet_id) {
            return Ok(Some(wallet.clone()));
        }
        Ok(self.shared.read()?.wallets.get(&wallet_id).cloned())
    }

    async fn update_wallet_balances(
        &mut self,
        wallet_id: WalletId,
        balances: Balances,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.guards.contains_key(&wallet_id) {
            return Err(StoreError::Database(format!(
                "wallet {wallet_id} updated without holding its lock"
            )));
        }

        let mut wallet = match self.wallets.get(&wallet_id) {
            Some(wallet) => wallet.clone(),
            None => self
                .shared
                .read()?
                .wallets
                .get(&wallet_id)
                .cloned()
                .ok_or_else(|| BillingError::not_found("wallet", wallet_id))?,
        };
        wallet.set_balances(balances, now);
        self.wallets.insert(wallet_id, wallet);
        Ok(())
    }

    async fn insert_wallet_transaction(
        &mut self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction> {
        let transaction_id =
            TransactionId::new(self.shared.write()?.next_id(table::WALLET_TRANSACTION));
        let record = transaction.with_id(transaction_id);
        self.transactions.push(record.clone());
        Ok(record)
    }

    async fn get_plan(&mut self, plan_id: PlanId) -> Result<Option<Plan>> {
        Ok(self.shared.read()?.plans.get(&plan_id).cloned())
    }

    async fn get_subscription(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        if let Some(subscription) = self.subscriptions.get(&subscription_id) {
            return Ok(Some(subscription.clone()));
        }
        Ok(self
            .shared
            .read()?
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn find_active_subscription(
        &mut self,
        wallet_id: WalletId,
    ) -> Result<Option<Subscription>> {
        self.active_for(wallet_id, None)
    }

    async fn insert_subscription(
        &mut self,
        subscription: NewSubscription,
    ) -> Result<Subscription> {
        if subscription.is_active && self.active_for(subscription.wallet_id, None)?.is_some() {
            return Err(active_conflict(subscription.wallet_id));
        }

        let subscription_id =
            SubscriptionId::new(self.shared.write()?.next_id(table::SUBSCRIPTION));
        let record = subscription.with_id(subscription_id);
        self.subscriptions.insert(subscription_id, record.clone());
        Ok(record)
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<()> {
        if subscription.is_active
            && self
                .active_for(subscription.wallet_id, Some(subscription.subscription_id))?
                .is_some()
        {
            return Err(active_conflict(subscription.wallet_id));
        }

        self.subscriptions
            .insert(subscription.subscription_id, subscription.clone());
        Ok(())
    }

    async fn insert_history(&mut self, entry: NewHistoryEntry) -> Result<SubscriptionHistory> {
        let history_id =
            HistoryId::new(self.shared.write()?.next_id(table::SUBSCRIPTION_HISTORY));
        let record = entry.with_id(history_id);
        self.history.push(record.clone());
        Ok(record)
    }

    async fn insert_gateway_payment(&mut self, payment: GatewayPayment) -> Result<()> {
        let staged = self
            .payments
            .iter()
            .any(|p| p.payment_id == payment.payment_id || p.order_id == payment.order_id);
        if staged || self.shared.read()?.redeemed(&payment).is_some() {
            return Err(payment_conflict(&payment));
        }
        self.payments.push(payment);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            shared,
            guards,
            wallets,
            subscriptions,
            transactions,
            history,
            payments,
        } = *self;

        let mut tables = shared.write()?;
        // A unit on another wallet may have redeemed the same payment meanwhile.
        if let Some(payment) = payments.iter().find(|p| tables.redeemed(p).is_some()) {
            return Err(payment_conflict(payment));
        }
        tables
            .payments
            .extend(payments.into_iter().map(|p| (p.payment_id.clone(), p)));
        tables.wallets.extend(wallets);
        tables.subscriptions.extend(subscriptions);
        tables
            .transactions
            .extend(transactions.into_iter().map(|tx| (tx.transaction_id, tx)));
        tables
            .history
            .extend(history.into_iter().map(|h| (h.history_id, h)));
        drop(tables);

        drop(guards);
        Ok(())
    }
}
