//! Database schema definitions.
//!
//! This module names the tables created by `migrations/`. The in-memory
//! backend keys its ID sequences by the same names.

/// Table names.
pub mod table {
    /// Reseller partners.
    pub const PARTNER: &str = "partner";

    /// Customer accounts.
    pub const ACCOUNT: &str = "account";

    /// Wallets, one row per wallet, holding both balance components.
    pub const WALLET: &str = "wallet";

    /// Immutable ledger records, one per balance change.
    pub const WALLET_TRANSACTION: &str = "wallet_transaction";

    /// Plans.
    pub const PLAN: &str = "plan";

    /// Plan features.
    pub const PLAN_FEATURE: &str = "plan_feature";

    /// Subscriptions. A partial unique index allows one active row per wallet.
    pub const SUBSCRIPTION: &str = "subscription";

    /// Append-only subscription lifecycle log.
    pub const SUBSCRIPTION_HISTORY: &str = "subscription_history";

    /// Partner commissions on wallet transactions.
    pub const PARTNER_TRANSACTION: &str = "partner_transaction";

    /// Partner payouts.
    pub const SETTLEMENT: &str = "settlement";

    /// Redeemed gateway payments, keyed by payment ID.
    pub const GATEWAY_PAYMENT: &str = "gateway_payment";
}

/// Returns all table names, in dependency order.
#[must_use]
pub fn all_tables() -> Vec<&'static str> {
    vec![
        table::PARTNER,
        table::ACCOUNT,
        table::WALLET,
        table::WALLET_TRANSACTION,
        table::PLAN,
        table::PLAN_FEATURE,
        table::SUBSCRIPTION,
        table::SUBSCRIPTION_HISTORY,
        table::PARTNER_TRANSACTION,
        table::SETTLEMENT,
        table::GATEWAY_PAYMENT,
    ]
}

/// Upper bound on page sizes for list operations.
pub const MAX_PAGE_SIZE: usize = 100;

/// Clamp a requested page size to `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}
