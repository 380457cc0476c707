//! Subscription types for wallet-billing.
//!
//! A wallet has at most one active subscription. The transitions on a single
//! row (activate, extend, cancel) live here as plain methods; sequencing them
//! under the wallet lock is the store's job.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plan::Plan;
use crate::{HistoryId, PlanId, SubscriptionId, WalletId};

/// History comment written when a new subscription displaces the active one.
pub const AUTO_CANCEL_COMMENT: &str = "Auto-cancelled before new subscription";

/// History comment for a fresh subscription.
pub const SUBSCRIBED_COMMENT: &str = "Subscribed to new plan";

/// History comment for a renewal.
pub const RENEWED_COMMENT: &str = "Subscription renewed";

/// History comment for a user cancellation.
pub const USER_CANCELLED_COMMENT: &str = "User cancelled";

/// History comment when a pre-created subscription is billed and activated.
pub const COMPLETED_COMMENT: &str = "Subscription completed";

/// Ledger source tag for plan charges.
pub const SUBSCRIPTION_SOURCE: &str = "Subscription";

/// A subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub subscription_id: SubscriptionId,
    /// Billed wallet.
    pub wallet_id: WalletId,
    /// Subscribed plan.
    pub plan_id: PlanId,
    /// Whether this is the wallet's current subscription.
    pub is_active: bool,
    /// Whether the plan amount went through the ledger.
    pub is_billed: bool,
    /// Start of the current window.
    pub start_time: Option<DateTime<Utc>>,
    /// End of the current window.
    pub end_time: Option<DateTime<Utc>>,
    /// Free-form tag (`"monthly"`, `"trial"`, ...).
    pub subscription_type: Option<String>,
}

impl Subscription {
    /// Mark billed and active with a window starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the window end is out of range; the row is
    /// left untouched.
    pub fn activate(&mut self, plan: &Plan, now: DateTime<Utc>) -> Result<()> {
        let end = plan.period_end(now)?;
        self.is_active = true;
        self.is_billed = true;
        self.start_time = Some(now);
        self.end_time = Some(end);
        Ok(())
    }

    /// Push the end of the window out by one plan period.
    ///
    /// Extends from the previous end time, not from `now`; `now` is only used
    /// when the row has no end time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the new end is out of range.
    pub fn extend(&mut self, plan: &Plan, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let end = plan.period_end(self.end_time.unwrap_or(now))?;
        self.end_time = Some(end);
        Ok(end)
    }

    /// Deactivate and close the window at `now`.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.end_time = Some(now);
    }
}

/// Input for a new subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    /// Billed wallet.
    pub wallet_id: WalletId,
    /// Subscribed plan.
    pub plan_id: PlanId,
    /// Active flag.
    #[serde(default)]
    pub is_active: bool,
    /// Billed flag.
    #[serde(default)]
    pub is_billed: bool,
    /// Window start.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Window end.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Free-form tag.
    #[serde(default)]
    pub subscription_type: Option<String>,
}

impl NewSubscription {
    /// An inactive, unbilled shell awaiting `completeSubscription`.
    #[must_use]
    pub const fn shell(wallet_id: WalletId, plan_id: PlanId) -> Self {
        Self {
            wallet_id,
            plan_id,
            is_active: false,
            is_billed: false,
            start_time: None,
            end_time: None,
            subscription_type: None,
        }
    }

    /// An active, billed subscription covering one plan period from `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the window end is out of range.
    pub fn active(wallet_id: WalletId, plan: &Plan, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            wallet_id,
            plan_id: plan.plan_id,
            is_active: true,
            is_billed: true,
            start_time: Some(now),
            end_time: Some(plan.period_end(now)?),
            subscription_type: None,
        })
    }

    /// Attach the store-assigned ID.
    #[must_use]
    pub fn with_id(self, subscription_id: SubscriptionId) -> Subscription {
        Subscription {
            subscription_id,
            wallet_id: self.wallet_id,
            plan_id: self.plan_id,
            is_active: self.is_active,
            is_billed: self.is_billed,
            start_time: self.start_time,
            end_time: self.end_time,
            subscription_type: self.subscription_type,
        }
    }
}

/// Lifecycle event recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    /// A subscription became active.
    Activated,
    /// A subscription was deactivated.
    Cancelled,
    /// A subscription window was extended.
    Renewed,
}

impl HistoryStatus {
    /// Lowercase name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Cancelled => "cancelled",
            Self::Renewed => "renewed",
        }
    }

    /// Parse a stored status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activated" => Some(Self::Activated),
            "cancelled" => Some(Self::Cancelled),
            "renewed" => Some(Self::Renewed),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the append-only history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionHistory {
    /// History ID.
    pub history_id: HistoryId,
    /// Subscription the event belongs to.
    pub subscription_id: SubscriptionId,
    /// Wallet of the subscription.
    pub wallet_id: WalletId,
    /// Plan at the time of the event.
    pub plan_id: PlanId,
    /// Event.
    pub status: HistoryStatus,
    /// Free-text comment.
    pub comment: String,
    /// When the event happened.
    pub created_at: DateTime<Utc>,
}

/// A history row without its ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    /// Subscription.
    pub subscription_id: SubscriptionId,
    /// Wallet.
    pub wallet_id: WalletId,
    /// Plan.
    pub plan_id: PlanId,
    /// Event.
    pub status: HistoryStatus,
    /// Comment.
    pub comment: String,
    /// Event time.
    pub created_at: DateTime<Utc>,
}

impl NewHistoryEntry {
    /// Build an entry for `subscription`.
    #[must_use]
    pub fn for_subscription(
        subscription: &Subscription,
        plan_id: PlanId,
        status: HistoryStatus,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subscription_id: subscription.subscription_id,
            wallet_id: subscription.wallet_id,
            plan_id,
            status,
            comment: comment.into(),
            created_at: now,
        }
    }

    /// Attach the store-assigned ID.
    #[must_use]
    pub fn with_id(self, history_id: HistoryId) -> SubscriptionHistory {
        SubscriptionHistory {
            history_id,
            subscription_id: self.subscription_id,
            wallet_id: self.wallet_id,
            plan_id: self.plan_id,
            status: self.status,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

/// Status reported back to callers of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active.
    Active,
    /// Subscription was cancelled.
    Cancelled,
}

/// Outcome of `subscribe`, `renew` and `cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionResult {
    /// Affected subscription.
    pub subscription_id: SubscriptionId,
    /// Wallet.
    pub wallet_id: WalletId,
    /// Plan.
    pub plan_id: PlanId,
    /// Resulting status.
    pub status: SubscriptionStatus,
    /// Window start (only reported by `subscribe`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Window end.
    pub end_time: DateTime<Utc>,
    /// Human-readable outcome.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn plan(days: i32) -> Plan {
        let now = Utc::now();
        Plan {
            plan_id: PlanId::new(1),
            plan_name: "Monthly".into(),
            plan_amount: 500,
            price: 500,
            duration_in_days: days,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn shell() -> Subscription {
        NewSubscription::shell(WalletId::new(1), PlanId::new(1)).with_id(SubscriptionId::new(1))
    }

    #[test]
    fn activate_stamps_window() {
        let now = Utc::now();
        let mut sub = shell();
        sub.activate(&plan(30), now).unwrap();
        assert!(sub.is_active && sub.is_billed);
        assert_eq!(sub.start_time, Some(now));
        assert_eq!(sub.end_time, Some(now + Duration::days(30)));
    }

    #[test]
    fn extend_is_additive_to_previous_end() {
        let now = Utc::now();
        let previous_end = now + Duration::days(3);
        let mut sub = shell();
        sub.end_time = Some(previous_end);

        let end = sub.extend(&plan(30), now).unwrap();
        assert_eq!(end, previous_end + Duration::days(30));
        assert_eq!(sub.end_time, Some(end));
    }

    #[test]
    fn extend_without_end_starts_from_now() {
        let now = Utc::now();
        let mut sub = shell();
        assert_eq!(sub.extend(&plan(7), now).unwrap(), now + Duration::days(7));
    }

    #[test]
    fn out_of_range_window_is_rejected_without_change() {
        let now = Utc::now();
        let endless = plan(i32::MAX);

        assert!(NewSubscription::active(WalletId::new(1), &endless, now).is_err());

        let mut sub = shell();
        assert!(sub.activate(&endless, now).is_err());
        assert_eq!(sub, shell());

        let mut sub = shell();
        sub.end_time = Some(DateTime::<Utc>::MAX_UTC);
        assert!(sub.extend(&plan(1), now).is_err());
        assert_eq!(sub.end_time, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn cancel_closes_window() {
        let now = Utc::now();
        let mut sub = NewSubscription::active(WalletId::new(1), &plan(30), now)
            .unwrap()
            .with_id(SubscriptionId::new(4));
        let later = now + Duration::days(1);
        sub.cancel(later);
        assert!(!sub.is_active);
        assert_eq!(sub.end_time, Some(later));
    }

    #[test]
    fn history_status_roundtrip() {
        for status in [
            HistoryStatus::Activated,
            HistoryStatus::Cancelled,
            HistoryStatus::Renewed,
        ] {
            assert_eq!(HistoryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(HistoryStatus::parse("paused"), None);
    }

    #[test]
    fn result_omits_missing_start_time() {
        let result = SubscriptionResult {
            subscription_id: SubscriptionId::new(1),
            wallet_id: WalletId::new(2),
            plan_id: PlanId::new(3),
            status: SubscriptionStatus::Cancelled,
            start_time: None,
            end_time: Utc::now(),
            message: "Subscription cancelled".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("start_time").is_none());
        assert_eq!(json["status"], "cancelled");
    }
}
