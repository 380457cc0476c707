//! Wallet transaction types.
//!
//! Every balance change produces exactly one immutable `WalletTransaction`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::{TransactionId, WalletId};

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money into the wallet.
    Credit,
    /// Money out of the wallet.
    Debit,
}

impl TransactionKind {
    /// Lowercase name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = BillingError;

    /// Case-insensitive: `"CREDIT"`, `"Credit"` and `"credit"` all parse.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            _ => Err(BillingError::InvalidTransactionKind(s.to_string())),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to move money in or out of a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Target wallet.
    pub wallet_id: WalletId,
    /// Credit or debit.
    pub kind: TransactionKind,
    /// Amount in minor units, strictly positive.
    pub amount: i64,
    /// Free-text origin of the movement (`"Subscription"`, `"Razorpay"`, ...).
    pub source: String,
    /// Optional remark.
    pub remark: Option<String>,
    /// Optional extra context.
    pub additional_info: Option<String>,
}

impl TransactionRequest {
    /// Build a credit request.
    #[must_use]
    pub fn credit(wallet_id: WalletId, amount: i64, source: impl Into<String>) -> Self {
        Self::new(wallet_id, TransactionKind::Credit, amount, source)
    }

    /// Build a debit request.
    #[must_use]
    pub fn debit(wallet_id: WalletId, amount: i64, source: impl Into<String>) -> Self {
        Self::new(wallet_id, TransactionKind::Debit, amount, source)
    }

    /// Build a request of either kind.
    #[must_use]
    pub fn new(
        wallet_id: WalletId,
        kind: TransactionKind,
        amount: i64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            wallet_id,
            kind,
            amount,
            source: source.into(),
            remark: None,
            additional_info: None,
        }
    }

    /// Attach a remark.
    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    /// Attach additional info.
    #[must_use]
    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    /// Check the request before any storage is touched.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive.
    /// - `MissingField` if `source` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= 0 {
            return Err(BillingError::InvalidAmount(format!(
                "amount must be greater than 0, got {}",
                self.amount
            )));
        }
        if self.source.trim().is_empty() {
            return Err(BillingError::MissingField("source"));
        }
        Ok(())
    }
}

/// An immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Transaction ID.
    pub transaction_id: TransactionId,
    /// Affected wallet.
    pub wallet_id: WalletId,
    /// Credit or debit.
    pub transaction_type: TransactionKind,
    /// Amount moved, always positive.
    pub amount: i64,
    /// Total balance before the movement.
    pub previous_balance: i64,
    /// Total balance after the movement.
    pub current_balance: i64,
    /// Origin of the movement.
    pub source: String,
    /// Optional remark.
    pub remark: Option<String>,
    /// Optional extra context.
    pub additional_info: Option<String>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Signed change of the total balance.
    #[must_use]
    pub const fn delta(&self) -> i64 {
        self.current_balance - self.previous_balance
    }
}

/// A ledger record that has not been assigned an ID yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWalletTransaction {
    /// Affected wallet.
    pub wallet_id: WalletId,
    /// Credit or debit.
    pub transaction_type: TransactionKind,
    /// Amount moved.
    pub amount: i64,
    /// Total before.
    pub previous_balance: i64,
    /// Total after.
    pub current_balance: i64,
    /// Origin.
    pub source: String,
    /// Remark.
    pub remark: Option<String>,
    /// Extra context.
    pub additional_info: Option<String>,
    /// Record time.
    pub created_at: DateTime<Utc>,
}

impl NewWalletTransaction {
    /// Attach the store-assigned ID.
    #[must_use]
    pub fn with_id(self, transaction_id: TransactionId) -> WalletTransaction {
        WalletTransaction {
            transaction_id,
            wallet_id: self.wallet_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            previous_balance: self.previous_balance,
            current_balance: self.current_balance,
            source: self.source,
            remark: self.remark,
            additional_info: self.additional_info,
            created_at: self.created_at,
        }
    }
}
