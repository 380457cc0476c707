//! Core types and utilities for wallet-billing.
//!
//! This crate provides the foundational types used throughout the wallet-billing platform:
//!
//! - **Identifiers**: `WalletId`, `PlanId`, `SubscriptionId`, ...
//! - **Wallets**: `Wallet`, `Balances` (two-tier balance arithmetic)
//! - **Ledger**: `TransactionKind`, `TransactionRequest`, `WalletTransaction`
//! - **Plans**: `Plan`, `PlanFeature`
//! - **Subscriptions**: `Subscription`, `SubscriptionHistory`, `SubscriptionResult`
//! - **Partners**: `Partner`, `Account`, `PartnerTransaction`, `Settlement`
//! - **Payments**: `GatewayPayment` (redeemed gateway payments)
//!
//! # Money
//!
//! All amounts are `i64` minor currency units (1 INR = 100 paise). A wallet
//! has a **monthly** and a **fixed** balance; debits draw down monthly first,
//! credits land in fixed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod partner;
pub mod payment;
pub mod plan;
pub mod subscription;
pub mod transaction;
pub mod wallet;

pub use error::{BillingError, ErrorKind, Result};
pub use ids::{
    AccountId, FeatureId, HistoryId, IdError, PartnerId, PartnerTransactionId, PlanId,
    SettlementId, SubscriptionId, TransactionId, WalletId,
};
pub use partner::{
    Account, NewAccount, NewPartner, NewPartnerTransaction, NewSettlement, Partner,
    PartnerTransaction, Settlement, SettlementStatus,
};
pub use payment::{GatewayPayment, NewGatewayPayment};
pub use plan::{NewPlan, NewPlanFeature, Plan, PlanFeature, MAX_DURATION_IN_DAYS};
pub use subscription::{
    HistoryStatus, NewHistoryEntry, NewSubscription, Subscription, SubscriptionHistory,
    SubscriptionResult, SubscriptionStatus, AUTO_CANCEL_COMMENT, COMPLETED_COMMENT,
    RENEWED_COMMENT, SUBSCRIBED_COMMENT, SUBSCRIPTION_SOURCE, USER_CANCELLED_COMMENT,
};
pub use transaction::{NewWalletTransaction, TransactionKind, TransactionRequest, WalletTransaction};
pub use wallet::{Balances, NewWallet, Wallet, WalletBalance};
