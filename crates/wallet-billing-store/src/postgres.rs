//! `PostgreSQL` storage backend.
//!
//! Plain reads and inserts run on the pool. A unit of work wraps one database
//! transaction; the wallet lock is a `SELECT ... FOR UPDATE` row lock, held
//! until commit or rollback.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::info;

use wallet_billing_core::{
    Account, AccountId, Balances, BillingError, FeatureId, GatewayPayment, HistoryId,
    HistoryStatus, NewAccount, NewHistoryEntry, NewPartner, NewPartnerTransaction, NewPlan,
    NewPlanFeature, NewSettlement, NewSubscription, NewWallet, NewWalletTransaction, Partner,
    PartnerId, PartnerTransaction, PartnerTransactionId, Plan, PlanFeature, PlanId, Settlement,
    SettlementId, SettlementStatus, Subscription, SubscriptionHistory, SubscriptionId,
    TransactionId, TransactionKind, Wallet, WalletId, WalletTransaction,
};

use crate::error::{Result, StoreError};
use crate::schema::{all_tables, clamp_limit};
use crate::{Store, UnitOfWork};

// ============================================================================
// Rows
// ============================================================================

#[derive(FromRow)]
struct PartnerRow {
    partner_id: i64,
    partner_name: String,
    partner_email: String,
    partner_phone: Option<String>,
    partner_address: Option<String>,
    is_active: bool,
    commission_rate_bps: Option<i32>,
    commission_type: Option<String>,
    onboarding_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Self {
            partner_id: PartnerId::new(row.partner_id),
            partner_name: row.partner_name,
            partner_email: row.partner_email,
            partner_phone: row.partner_phone,
            partner_address: row.partner_address,
            is_active: row.is_active,
            commission_rate_bps: row.commission_rate_bps,
            commission_type: row.commission_type,
            onboarding_date: row.onboarding_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PARTNER_COLUMNS: &str = "partner_id, partner_name, partner_email, partner_phone, \
     partner_address, is_active, commission_rate_bps, commission_type, onboarding_date, \
     created_at, updated_at";

#[derive(FromRow)]
struct AccountRow {
    account_id: i64,
    account_name: String,
    is_active: bool,
    partner_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            account_id: AccountId::new(row.account_id),
            account_name: row.account_name,
            is_active: row.is_active,
            partner_id: row.partner_id.map(PartnerId::new),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct WalletRow {
    wallet_id: i64,
    account_id: i64,
    monthly_balance: i64,
    fixed_balance: i64,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            wallet_id: WalletId::new(row.wallet_id),
            account_id: AccountId::new(row.account_id),
            monthly_balance: row.monthly_balance,
            fixed_balance: row.fixed_balance,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TransactionRow {
    transaction_id: i64,
    wallet_id: i64,
    transaction_type: String,
    amount: i64,
    previous_balance: i64,
    current_balance: i64,
    source: String,
    remark: Option<String>,
    additional_info: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let transaction_type: TransactionKind = row.transaction_type.parse().map_err(|_| {
            StoreError::CorruptRow(format!(
                "wallet_transaction {}: unknown type {:?}",
                row.transaction_id, row.transaction_type
            ))
        })?;
        Ok(Self {
            transaction_id: TransactionId::new(row.transaction_id),
            wallet_id: WalletId::new(row.wallet_id),
            transaction_type,
            amount: row.amount,
            previous_balance: row.previous_balance,
            current_balance: row.current_balance,
            source: row.source,
            remark: row.remark,
            additional_info: row.additional_info,
            created_at: row.created_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "transaction_id, wallet_id, transaction_type, amount, \
     previous_balance, current_balance, source, remark, additional_info, created_at";

#[derive(FromRow)]
struct PlanRow {
    plan_id: i64,
    plan_name: String,
    plan_amount: i64,
    price: i64,
    duration_in_days: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Self {
            plan_id: PlanId::new(row.plan_id),
            plan_name: row.plan_name,
            plan_amount: row.plan_amount,
            price: row.price,
            duration_in_days: row.duration_in_days,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PLAN_COLUMNS: &str =
    "plan_id, plan_name, plan_amount, price, duration_in_days, is_active, created_at, updated_at";

#[derive(FromRow)]
struct FeatureRow {
    feature_id: i64,
    plan_id: i64,
    feature_name: String,
    feature_description: Option<String>,
    feature_category: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<FeatureRow> for PlanFeature {
    fn from(row: FeatureRow) -> Self {
        Self {
            feature_id: FeatureId::new(row.feature_id),
            plan_id: PlanId::new(row.plan_id),
            feature_name: row.feature_name,
            feature_description: row.feature_description,
            feature_category: row.feature_category,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    subscription_id: i64,
    wallet_id: i64,
    plan_id: i64,
    is_active: bool,
    is_billed: bool,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    subscription_type: Option<String>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            subscription_id: SubscriptionId::new(row.subscription_id),
            wallet_id: WalletId::new(row.wallet_id),
            plan_id: PlanId::new(row.plan_id),
            is_active: row.is_active,
            is_billed: row.is_billed,
            start_time: row.start_time,
            end_time: row.end_time,
            subscription_type: row.subscription_type,
        }
    }
}

const SUBSCRIPTION_COLUMNS: &str = "subscription_id, wallet_id, plan_id, is_active, is_billed, \
     start_time, end_time, subscription_type";

#[derive(FromRow)]
struct HistoryRow {
    history_id: i64,
    subscription_id: i64,
    wallet_id: i64,
    plan_id: i64,
    status: String,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for SubscriptionHistory {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        let status = HistoryStatus::parse(&row.status).ok_or_else(|| {
            StoreError::CorruptRow(format!(
                "subscription_history {}: unknown status {:?}",
                row.history_id, row.status
            ))
        })?;
        Ok(Self {
            history_id: HistoryId::new(row.history_id),
            subscription_id: SubscriptionId::new(row.subscription_id),
            wallet_id: WalletId::new(row.wallet_id),
            plan_id: PlanId::new(row.plan_id),
            status,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

const HISTORY_COLUMNS: &str =
    "history_id, subscription_id, wallet_id, plan_id, status, comment, created_at";

#[derive(FromRow)]
struct PartnerTransactionRow {
    partner_transaction_id: i64,
    partner_id: i64,
    transaction_id: i64,
    is_active: bool,
    commission_amount: i64,
    transaction_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<PartnerTransactionRow> for PartnerTransaction {
    fn from(row: PartnerTransactionRow) -> Self {
        Self {
            partner_transaction_id: PartnerTransactionId::new(row.partner_transaction_id),
            partner_id: PartnerId::new(row.partner_id),
            transaction_id: TransactionId::new(row.transaction_id),
            is_active: row.is_active,
            commission_amount: row.commission_amount,
            transaction_date: row.transaction_date,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SettlementRow {
    settlement_id: i64,
    partner_id: i64,
    partner_transaction_id: i64,
    settlement_status: String,
    settlement_date: Option<DateTime<Utc>>,
    settlement_amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for Settlement {
    type Error = StoreError;

    fn try_from(row: SettlementRow) -> Result<Self> {
        let settlement_status = SettlementStatus::parse(&row.settlement_status).ok_or_else(|| {
            StoreError::CorruptRow(format!(
                "settlement {}: unknown status {:?}",
                row.settlement_id, row.settlement_status
            ))
        })?;
        Ok(Self {
            settlement_id: SettlementId::new(row.settlement_id),
            partner_id: PartnerId::new(row.partner_id),
            partner_transaction_id: PartnerTransactionId::new(row.partner_transaction_id),
            settlement_status,
            settlement_date: row.settlement_date,
            settlement_amount: row.settlement_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct GatewayPaymentRow {
    payment_id: String,
    order_id: String,
    wallet_id: i64,
    plan_id: i64,
    subscription_id: i64,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl From<GatewayPaymentRow> for GatewayPayment {
    fn from(row: GatewayPaymentRow) -> Self {
        Self {
            payment_id: row.payment_id,
            order_id: row.order_id,
            wallet_id: WalletId::new(row.wallet_id),
            plan_id: PlanId::new(row.plan_id),
            subscription_id: SubscriptionId::new(row.subscription_id),
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

const GATEWAY_PAYMENT_COLUMNS: &str =
    "payment_id, order_id, wallet_id, plan_id, subscription_id, amount, created_at";

/// Convert a page request to SQL `LIMIT`/`OFFSET` values.
fn page(limit: usize, offset: usize) -> (i64, i64) {
    let limit = i64::try_from(clamp_limit(limit)).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    (limit, offset)
}

// ============================================================================
// Store
// ============================================================================

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Check that every table exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` naming the first missing table.
    pub async fn verify_schema(&self) -> Result<()> {
        for table in all_tables() {
            let found: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
            if found.is_none() {
                return Err(StoreError::Database(format!("missing table: {table}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_partner(&self, partner: &NewPartner) -> Result<Partner> {
        let sql = format!(
            "INSERT INTO partner (partner_name, partner_email, partner_phone, partner_address, \
             is_active, commission_rate_bps, commission_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PARTNER_COLUMNS}"
        );
        let row: PartnerRow = sqlx::query_as(&sql)
            .bind(&partner.partner_name)
            .bind(&partner.partner_email)
            .bind(partner.partner_phone.as_deref())
            .bind(partner.partner_address.as_deref())
            .bind(partner.is_active)
            .bind(partner.commission_rate_bps)
            .bind(partner.commission_type.as_deref())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get_partner(&self, partner_id: PartnerId) -> Result<Option<Partner>> {
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partner WHERE partner_id = $1");
        let row: Option<PartnerRow> = sqlx::query_as(&sql)
            .bind(partner_id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_partners(&self, limit: usize, offset: usize) -> Result<Vec<Partner>> {
        let (limit, offset) = page(limit, offset);
        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM partner ORDER BY partner_id LIMIT $1 OFFSET $2"
        );
        let rows: Vec<PartnerRow> = sqlx::query_as(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let row: AccountRow = sqlx::query_as(
            "INSERT INTO account (account_name, is_active, partner_id) VALUES ($1, $2, $3) \
             RETURNING account_id, account_name, is_active, partner_id, created_at",
        )
        .bind(&account.account_name)
        .bind(account.is_active)
        .bind(account.partner_id.map(PartnerId::get))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT account_id, account_name, is_active, partner_id, created_at \
             FROM account WHERE account_id = $1",
        )
        .bind(account_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_wallet(&self, wallet: &NewWallet) -> Result<Wallet> {
        let row: WalletRow = sqlx::query_as(
            "INSERT INTO wallet (account_id, monthly_balance, fixed_balance) VALUES ($1, $2, $3) \
             RETURNING wallet_id, account_id, monthly_balance, fixed_balance, updated_at",
        )
        .bind(wallet.account_id.get())
        .bind(wallet.monthly_balance)
        .bind(wallet.fixed_balance)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT wallet_id, account_id, monthly_balance, fixed_balance, updated_at \
             FROM wallet WHERE wallet_id = $1",
        )
        .bind(wallet_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_wallet_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<WalletTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transaction WHERE transaction_id = $1"
        );
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(transaction_id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_wallet_transactions(
        &self,
        wallet_id: WalletId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>> {
        let (limit, offset) = page(limit, offset);
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM wallet_transaction WHERE wallet_id = $1 \
             ORDER BY transaction_id DESC LIMIT $2 OFFSET $3"
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(wallet_id.get())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan> {
        let sql = format!(
            "INSERT INTO plan (plan_name, plan_amount, price, duration_in_days, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PLAN_COLUMNS}"
        );
        let row: PlanRow = sqlx::query_as(&sql)
            .bind(&plan.plan_name)
            .bind(plan.plan_amount)
            .bind(plan.effective_price())
            .bind(plan.duration_in_days)
            .bind(plan.is_active)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plan WHERE plan_id = $1");
        let row: Option<PlanRow> = sqlx::query_as(&sql)
            .bind(plan_id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM plan WHERE is_active OR NOT $1 ORDER BY plan_id"
        );
        let rows: Vec<PlanRow> = sqlx::query_as(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_plan_feature(
        &self,
        plan_id: PlanId,
        feature: &NewPlanFeature,
    ) -> Result<PlanFeature> {
        let row: FeatureRow = sqlx::query_as(
            "INSERT INTO plan_feature \
             (plan_id, feature_name, feature_description, feature_category, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING feature_id, plan_id, feature_name, feature_description, \
             feature_category, is_active, created_at",
        )
        .bind(plan_id.get())
        .bind(&feature.feature_name)
        .bind(feature.feature_description.as_deref())
        .bind(feature.feature_category.as_deref())
        .bind(feature.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_plan_features(&self, plan_id: PlanId) -> Result<Vec<PlanFeature>> {
        let rows: Vec<FeatureRow> = sqlx::query_as(
            "SELECT feature_id, plan_id, feature_name, feature_description, feature_category, \
             is_active, created_at FROM plan_feature WHERE plan_id = $1 ORDER BY feature_id",
        )
        .bind(plan_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_subscription(&self, subscription: &NewSubscription) -> Result<Subscription> {
        let mut conn = self.pool.acquire().await?;
        insert_subscription(&mut conn, subscription).await
    }

    async fn get_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        select_subscription(&mut conn, subscription_id).await
    }

    async fn list_subscription_history(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<SubscriptionHistory>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM subscription_history WHERE wallet_id = $1 \
             ORDER BY history_id DESC"
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql)
            .bind(wallet_id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_partner_transaction(
        &self,
        record: &NewPartnerTransaction,
        commission_amount: i64,
    ) -> Result<PartnerTransaction> {
        let row: Option<PartnerTransactionRow> = sqlx::query_as(
            "INSERT INTO partner_transaction \
             (partner_id, transaction_id, is_active, commission_amount, transaction_date) \
             SELECT $1, wt.transaction_id, $3, $4, wt.created_at \
             FROM wallet_transaction wt WHERE wt.transaction_id = $2 \
             RETURNING partner_transaction_id, partner_id, transaction_id, is_active, \
             commission_amount, transaction_date, created_at",
        )
        .bind(record.partner_id.get())
        .bind(record.transaction_id.get())
        .bind(record.is_active)
        .bind(commission_amount)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or_else(|| {
            BillingError::not_found("wallet transaction", record.transaction_id).into()
        })
    }

    async fn create_settlement(&self, settlement: &NewSettlement) -> Result<Settlement> {
        let row: SettlementRow = sqlx::query_as(
            "INSERT INTO settlement (partner_id, partner_transaction_id, settlement_status, \
             settlement_date, settlement_amount) VALUES ($1, $2, $3, $4, $5) \
             RETURNING settlement_id, partner_id, partner_transaction_id, settlement_status, \
             settlement_date, settlement_amount, created_at, updated_at",
        )
        .bind(settlement.partner_id.get())
        .bind(settlement.partner_transaction_id.get())
        .bind(settlement.settlement_status.as_str())
        .bind(settlement.settlement_date)
        .bind(settlement.settlement_amount)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_gateway_payment(&self, payment_id: &str) -> Result<Option<GatewayPayment>> {
        let sql =
            format!("SELECT {GATEWAY_PAYMENT_COLUMNS} FROM gateway_payment WHERE payment_id = $1");
        let row: Option<GatewayPaymentRow> = sqlx::query_as(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// Queries shared by the pool and units of work
// ============================================================================

async fn insert_subscription(
    conn: &mut sqlx::PgConnection,
    subscription: &NewSubscription,
) -> Result<Subscription> {
    let sql = format!(
        "INSERT INTO subscription \
         (wallet_id, plan_id, is_active, is_billed, start_time, end_time, subscription_type) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {SUBSCRIPTION_COLUMNS}"
    );
    let row: SubscriptionRow = sqlx::query_as(&sql)
        .bind(subscription.wallet_id.get())
        .bind(subscription.plan_id.get())
        .bind(subscription.is_active)
        .bind(subscription.is_billed)
        .bind(subscription.start_time)
        .bind(subscription.end_time)
        .bind(subscription.subscription_type.as_deref())
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.into())
}

async fn select_subscription(
    conn: &mut sqlx::PgConnection,
    subscription_id: SubscriptionId,
) -> Result<Option<Subscription>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscription WHERE subscription_id = $1");
    let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
        .bind(subscription_id.get())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Into::into))
}

// ============================================================================
// Unit of work
// ============================================================================

/// A unit of work over [`PgStore`]: one database transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_wallet(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT wallet_id, account_id, monthly_balance, fixed_balance, updated_at \
             FROM wallet WHERE wallet_id = $1 FOR UPDATE",
        )
        .bind(wallet_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_wallet_balances(
        &mut self,
        wallet_id: WalletId,
        balances: Balances,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wallet SET monthly_balance = $2, fixed_balance = $3, updated_at = $4 \
             WHERE wallet_id = $1",
        )
        .bind(wallet_id.get())
        .bind(balances.monthly)
        .bind(balances.fixed)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BillingError::not_found("wallet", wallet_id).into());
        }
        Ok(())
    }

    async fn insert_wallet_transaction(
        &mut self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransaction> {
        let sql = format!(
            "INSERT INTO wallet_transaction (wallet_id, transaction_type, amount, \
             previous_balance, current_balance, source, remark, additional_info, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {TRANSACTION_COLUMNS}"
        );
        let row: TransactionRow = sqlx::query_as(&sql)
            .bind(transaction.wallet_id.get())
            .bind(transaction.transaction_type.as_str())
            .bind(transaction.amount)
            .bind(transaction.previous_balance)
            .bind(transaction.current_balance)
            .bind(&transaction.source)
            .bind(transaction.remark.as_deref())
            .bind(transaction.additional_info.as_deref())
            .bind(transaction.created_at)
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn get_plan(&mut self, plan_id: PlanId) -> Result<Option<Plan>> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plan WHERE plan_id = $1");
        let row: Option<PlanRow> = sqlx::query_as(&sql)
            .bind(plan_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_subscription(
        &mut self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        select_subscription(&mut self.tx, subscription_id).await
    }

    async fn find_active_subscription(
        &mut self,
        wallet_id: WalletId,
    ) -> Result<Option<Subscription>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscription \
             WHERE wallet_id = $1 AND is_active LIMIT 1"
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(wallet_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_subscription(
        &mut self,
        subscription: NewSubscription,
    ) -> Result<Subscription> {
        insert_subscription(&mut self.tx, &subscription).await
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<()> {
        let result = sqlx::query(
            "UPDATE subscription SET is_active = $2, is_billed = $3, start_time = $4, \
             end_time = $5, subscription_type = $6 WHERE subscription_id = $1",
        )
        .bind(subscription.subscription_id.get())
        .bind(subscription.is_active)
        .bind(subscription.is_billed)
        .bind(subscription.start_time)
        .bind(subscription.end_time)
        .bind(subscription.subscription_type.as_deref())
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(
                BillingError::not_found("subscription", subscription.subscription_id).into(),
            );
        }
        Ok(())
    }

    async fn insert_history(&mut self, entry: NewHistoryEntry) -> Result<SubscriptionHistory> {
        let sql = format!(
            "INSERT INTO subscription_history \
             (subscription_id, wallet_id, plan_id, status, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {HISTORY_COLUMNS}"
        );
        let row: HistoryRow = sqlx::query_as(&sql)
            .bind(entry.subscription_id.get())
            .bind(entry.wallet_id.get())
            .bind(entry.plan_id.get())
            .bind(entry.status.as_str())
            .bind(&entry.comment)
            .bind(entry.created_at)
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn insert_gateway_payment(&mut self, payment: GatewayPayment) -> Result<()> {
        sqlx::query(
            "INSERT INTO gateway_payment \
             (payment_id, order_id, wallet_id, plan_id, subscription_id, amount, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&payment.payment_id)
        .bind(&payment.order_id)
        .bind(payment.wallet_id.get())
        .bind(payment.plan_id.get())
        .bind(payment.subscription_id.get())
        .bind(payment.amount)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limit() {
        assert_eq!(page(0, 0), (1, 0));
        assert_eq!(page(1_000, 20), (100, 20));
    }

    #[test]
    fn corrupt_transaction_type_is_reported() {
        let row = TransactionRow {
            transaction_id: 9,
            wallet_id: 1,
            transaction_type: "refund".into(),
            amount: 10,
            previous_balance: 0,
            current_balance: 10,
            source: "test".into(),
            remark: None,
            additional_info: None,
            created_at: Utc::now(),
        };
        let err = WalletTransaction::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow(_)));
    }

    #[test]
    fn transaction_type_is_case_insensitive() {
        let row = TransactionRow {
            transaction_id: 1,
            wallet_id: 1,
            transaction_type: "Debit".into(),
            amount: 10,
            previous_balance: 10,
            current_balance: 0,
            source: "test".into(),
            remark: None,
            additional_info: None,
            created_at: Utc::now(),
        };
        let tx = WalletTransaction::try_from(row).unwrap();
        assert_eq!(tx.transaction_type, TransactionKind::Debit);
    }
}
