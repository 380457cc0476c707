//! Partners, accounts and partner payouts.
//!
//! Partners onboard accounts; accounts own wallets. Partners earn a commission
//! on wallet transactions, recorded as `PartnerTransaction`s and paid out in
//! `Settlement`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::{AccountId, PartnerId, PartnerTransactionId, SettlementId, TransactionId};

/// A reseller partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Partner ID.
    pub partner_id: PartnerId,
    /// Display name.
    pub partner_name: String,
    /// Contact email, unique across partners.
    pub partner_email: String,
    /// Contact phone.
    pub partner_phone: Option<String>,
    /// Postal address.
    pub partner_address: Option<String>,
    /// Whether the partner is active.
    pub is_active: bool,
    /// Commission in basis points (250 = 2.5%).
    pub commission_rate_bps: Option<i32>,
    /// Free-form commission scheme label.
    pub commission_type: Option<String>,
    /// When the partner was onboarded.
    pub onboarding_date: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    /// Commission owed on `amount`, rounded down. Zero without a rate.
    #[must_use]
    pub fn commission_for(&self, amount: i64) -> i64 {
        self.commission_rate_bps
            .map_or(0, |bps| amount.saturating_mul(i64::from(bps)) / 10_000)
    }
}

/// Input for creating a partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartner {
    /// Display name.
    pub partner_name: String,
    /// Contact email.
    pub partner_email: String,
    /// Contact phone.
    #[serde(default)]
    pub partner_phone: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub partner_address: Option<String>,
    /// Defaults to active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Commission in basis points.
    #[serde(default)]
    pub commission_rate_bps: Option<i32>,
    /// Commission scheme label.
    #[serde(default)]
    pub commission_type: Option<String>,
}

impl NewPartner {
    /// Check the partner details.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for blank name or malformed email, and
    /// `InvalidAmount` for a commission outside 0..=10000 bps.
    pub fn validate(&self) -> Result<()> {
        if self.partner_name.trim().is_empty() {
            return Err(BillingError::MissingField("partner_name"));
        }
        let email = self.partner_email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(BillingError::MissingField("partner_email")),
        }
        if let Some(bps) = self.commission_rate_bps {
            if !(0..=10_000).contains(&bps) {
                return Err(BillingError::InvalidAmount(format!(
                    "commission_rate_bps must be within 0..=10000, got {bps}"
                )));
            }
        }
        Ok(())
    }
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub account_id: AccountId,
    /// Display name.
    pub account_name: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// Onboarding partner, if any.
    pub partner_id: Option<PartnerId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Display name.
    pub account_name: String,
    /// Defaults to active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Onboarding partner.
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
}

impl NewAccount {
    /// Check the account details.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for a blank name.
    pub fn validate(&self) -> Result<()> {
        if self.account_name.trim().is_empty() {
            return Err(BillingError::MissingField("account_name"));
        }
        Ok(())
    }
}

/// Commission earned by a partner on a wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerTransaction {
    /// Record ID.
    pub partner_transaction_id: PartnerTransactionId,
    /// Earning partner.
    pub partner_id: PartnerId,
    /// Wallet transaction the commission is on.
    pub transaction_id: TransactionId,
    /// Whether the record counts towards settlement.
    pub is_active: bool,
    /// Commission in minor units.
    pub commission_amount: i64,
    /// Date of the underlying transaction.
    pub transaction_date: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for recording a partner commission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartnerTransaction {
    /// Earning partner.
    pub partner_id: PartnerId,
    /// Wallet transaction.
    pub transaction_id: TransactionId,
    /// Commission; computed from the partner's rate when omitted.
    #[serde(default)]
    pub commission_amount: Option<i64>,
    /// Defaults to active.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Settlement lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Recorded, not yet paid.
    Pending,
    /// Payout in flight.
    Processing,
    /// Paid.
    Completed,
    /// Payout failed.
    Failed,
}

impl SettlementStatus {
    /// Lowercase name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A payout to a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Settlement ID.
    pub settlement_id: SettlementId,
    /// Paid partner.
    pub partner_id: PartnerId,
    /// Commission record being settled.
    pub partner_transaction_id: PartnerTransactionId,
    /// Lifecycle status.
    pub settlement_status: SettlementStatus,
    /// Payout date.
    pub settlement_date: Option<DateTime<Utc>>,
    /// Payout amount in minor units.
    pub settlement_amount: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSettlement {
    /// Paid partner.
    pub partner_id: PartnerId,
    /// Commission record.
    pub partner_transaction_id: PartnerTransactionId,
    /// Defaults to pending.
    #[serde(default = "default_settlement_status")]
    pub settlement_status: SettlementStatus,
    /// Payout date.
    #[serde(default)]
    pub settlement_date: Option<DateTime<Utc>>,
    /// Payout amount.
    pub settlement_amount: i64,
}

impl NewSettlement {
    /// Check the settlement.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a negative amount.
    pub fn validate(&self) -> Result<()> {
        if self.settlement_amount < 0 {
            return Err(BillingError::InvalidAmount(format!(
                "settlement_amount must be non-negative, got {}",
                self.settlement_amount
            )));
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

const fn default_settlement_status() -> SettlementStatus {
    SettlementStatus::Pending
}
