//! Wallet types and the two-tier balance arithmetic.
//!
//! A wallet holds two balance components:
//!
//! - **monthly**: the replenishable allotment, drawn down first on debit.
//! - **fixed**: the carry-over/top-up allotment, drawn down second. Credits land here.
//!
//! All amounts are `i64` minor currency units (paise for INR).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::transaction::TransactionKind;
use crate::{AccountId, WalletId};

/// A wallet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet ID.
    pub wallet_id: WalletId,

    /// Owning account.
    pub account_id: AccountId,

    /// Replenishable allotment in minor units.
    pub monthly_balance: i64,

    /// Carry-over/top-up allotment in minor units.
    pub fixed_balance: i64,

    /// When the balances last changed.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// The two balance components.
    #[must_use]
    pub const fn balances(&self) -> Balances {
        Balances {
            monthly: self.monthly_balance,
            fixed: self.fixed_balance,
        }
    }

    /// Store new balance components, stamping the update time.
    pub fn set_balances(&mut self, balances: Balances, now: DateTime<Utc>) {
        self.monthly_balance = balances.monthly;
        self.fixed_balance = balances.fixed;
        self.updated_at = now;
    }
}

/// Input for creating a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWallet {
    /// Owning account.
    pub account_id: AccountId,

    /// Opening monthly balance.
    #[serde(default)]
    pub monthly_balance: i64,

    /// Opening fixed balance.
    #[serde(default)]
    pub fixed_balance: i64,
}

impl NewWallet {
    /// Check the opening balances.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if either component is negative or the total overflows.
    pub fn validate(&self) -> Result<()> {
        Balances::new(self.monthly_balance, self.fixed_balance).map(|_| ())
    }
}

/// Balance snapshot returned by `getBalance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Wallet ID.
    pub wallet_id: WalletId,
    /// Monthly component.
    pub monthly_balance: i64,
    /// Fixed component.
    pub fixed_balance: i64,
    /// Sum of both components.
    pub total_balance: i64,
}

impl From<&Wallet> for WalletBalance {
    fn from(wallet: &Wallet) -> Self {
        Self {
            wallet_id: wallet.wallet_id,
            monthly_balance: wallet.monthly_balance,
            fixed_balance: wallet.fixed_balance,
            total_balance: wallet.monthly_balance.saturating_add(wallet.fixed_balance),
        }
    }
}

/// The two balance components of a wallet.
///
/// Both components are non-negative and their sum fits in an `i64`. Every
/// constructor and operation preserves that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Replenishable allotment.
    pub monthly: i64,
    /// Carry-over/top-up allotment.
    pub fixed: i64,
}

impl Balances {
    /// Build a balance pair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if either component is negative or the total overflows.
    pub fn new(monthly: i64, fixed: i64) -> Result<Self> {
        if monthly < 0 || fixed < 0 {
            return Err(BillingError::InvalidAmount(format!(
                "balances must be non-negative: monthly={monthly}, fixed={fixed}"
            )));
        }
        if monthly.checked_add(fixed).is_none() {
            return Err(BillingError::InvalidAmount("total balance overflows".into()));
        }
        Ok(Self { monthly, fixed })
    }

    /// Sum of both components.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.monthly + self.fixed
    }

    /// Add `amount` to the fixed component.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount` is not positive or the total would overflow.
    pub fn credit(self, amount: i64) -> Result<Self> {
        ensure_positive(amount)?;
        let fixed = self
            .fixed
            .checked_add(amount)
            .ok_or_else(|| BillingError::InvalidAmount("credit overflows balance".into()))?;
        Self::new(self.monthly, fixed)
    }

    /// Remove `amount`, monthly component first, shortfall from fixed.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive.
    /// - `InsufficientFunds` if `amount` exceeds the total.
    pub fn debit(self, amount: i64) -> Result<Self> {
        ensure_positive(amount)?;
        let available = self.total();
        if available < amount {
            return Err(BillingError::InsufficientFunds {
                available,
                required: amount,
            });
        }

        if self.monthly >= amount {
            Ok(Self {
                monthly: self.monthly - amount,
                fixed: self.fixed,
            })
        } else {
            let shortfall = amount - self.monthly;
            Ok(Self {
                monthly: 0,
                fixed: self.fixed - shortfall,
            })
        }
    }

    /// Apply a credit or debit.
    ///
    /// # Errors
    ///
    /// See [`Balances::credit`] and [`Balances::debit`].
    pub fn apply(self, kind: TransactionKind, amount: i64) -> Result<Self> {
        match kind {
            TransactionKind::Credit => self.credit(amount),
            TransactionKind::Debit => self.debit(amount),
        }
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(BillingError::InvalidAmount(format!(
            "amount must be greater than 0, got {amount}"
        )));
    }
    Ok(())
}
