//! Plan types for wallet-billing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::{FeatureId, PlanId};

/// Longest billing period a plan may define (about a century).
pub const MAX_DURATION_IN_DAYS: i32 = 36_500;

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan ID.
    pub plan_id: PlanId,

    /// Display name.
    pub plan_name: String,

    /// Amount moved through the ledger when the plan is billed (minor units).
    pub plan_amount: i64,

    /// Checkout price charged by the payment gateway (minor units).
    pub price: i64,

    /// Length of one billing period.
    pub duration_in_days: i32,

    /// Whether new subscriptions may be taken out.
    pub is_active: bool,

    /// When the plan was created.
    pub created_at: DateTime<Utc>,

    /// When the plan was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// One billing period as a duration.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::days(i64::from(self.duration_in_days))
    }

    /// `from` plus one billing period.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the end falls outside the representable
    /// date range.
    pub fn period_end(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        from.checked_add_signed(self.period()).ok_or_else(|| {
            BillingError::InvalidAmount(format!(
                "plan {} period of {} days runs past the supported date range",
                self.plan_id, self.duration_in_days
            ))
        })
    }
}

/// Input for creating a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlan {
    /// Display name.
    pub plan_name: String,
    /// Ledger amount.
    pub plan_amount: i64,
    /// Gateway price; defaults to the ledger amount.
    #[serde(default)]
    pub price: Option<i64>,
    /// Period length in days.
    pub duration_in_days: i32,
    /// Defaults to active.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPlan {
    /// Check the plan definition.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for a blank name and `InvalidAmount` for negative
    /// money or a non-positive duration.
    pub fn validate(&self) -> Result<()> {
        if self.plan_name.trim().is_empty() {
            return Err(BillingError::MissingField("plan_name"));
        }
        if self.plan_amount < 0 || self.price.is_some_and(|p| p < 0) {
            return Err(BillingError::InvalidAmount(
                "plan amount and price must be non-negative".into(),
            ));
        }
        if self.duration_in_days <= 0 || self.duration_in_days > MAX_DURATION_IN_DAYS {
            return Err(BillingError::InvalidAmount(format!(
                "duration_in_days must be between 1 and {MAX_DURATION_IN_DAYS}, got {}",
                self.duration_in_days
            )));
        }
        Ok(())
    }

    /// Gateway price, falling back to the ledger amount.
    #[must_use]
    pub fn effective_price(&self) -> i64 {
        self.price.unwrap_or(self.plan_amount)
    }
}

/// A feature listed on a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeature {
    /// Feature ID.
    pub feature_id: FeatureId,
    /// Owning plan.
    pub plan_id: PlanId,
    /// Name.
    pub feature_name: String,
    /// Description.
    pub feature_description: Option<String>,
    /// Grouping label.
    pub feature_category: Option<String>,
    /// Whether the feature is shown.
    pub is_active: bool,
    /// When the feature was added.
    pub created_at: DateTime<Utc>,
}

/// Input for adding a feature to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlanFeature {
    /// Name.
    pub feature_name: String,
    /// Description.
    #[serde(default)]
    pub feature_description: Option<String>,
    /// Grouping label.
    #[serde(default)]
    pub feature_category: Option<String>,
    /// Defaults to active.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPlanFeature {
    /// Check the feature definition.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for a blank name.
    pub fn validate(&self) -> Result<()> {
        if self.feature_name.trim().is_empty() {
            return Err(BillingError::MissingField("feature_name"));
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_plan() -> NewPlan {
        NewPlan {
            plan_name: "Monthly".into(),
            plan_amount: 49_900,
            price: None,
            duration_in_days: 30,
            is_active: true,
        }
    }

    #[test]
    fn valid_plan_passes() {
        assert!(new_plan().validate().is_ok());
        assert_eq!(new_plan().effective_price(), 49_900);
    }

    #[test]
    fn blank_name_and_bad_duration_fail() {
        let mut plan = new_plan();
        plan.plan_name = " ".into();
        assert_eq!(plan.validate(), Err(BillingError::MissingField("plan_name")));

        let mut plan = new_plan();
        plan.duration_in_days = 0;
        assert!(matches!(plan.validate(), Err(BillingError::InvalidAmount(_))));
    }

    #[test]
    fn duration_is_capped() {
        let mut plan = new_plan();
        plan.duration_in_days = MAX_DURATION_IN_DAYS;
        assert!(plan.validate().is_ok());

        plan.duration_in_days = MAX_DURATION_IN_DAYS + 1;
        assert!(matches!(plan.validate(), Err(BillingError::InvalidAmount(_))));

        plan.duration_in_days = i32::MAX;
        assert!(matches!(plan.validate(), Err(BillingError::InvalidAmount(_))));
    }

    #[test]
    fn is_active_defaults_to_true() {
        let plan: NewPlan = serde_json::from_str(
            r#"{"plan_name":"Yearly","plan_amount":100,"duration_in_days":365}"#,
        )
        .unwrap();
        assert!(plan.is_active);
        assert_eq!(plan.price, None);
    }

    #[test]
    fn period_matches_duration() {
        let now = Utc::now();
        let plan = Plan {
            plan_id: PlanId::new(1),
            plan_name: "Weekly".into(),
            plan_amount: 10,
            price: 10,
            duration_in_days: 7,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(plan.period(), Duration::days(7));
        assert_eq!(plan.period_end(now).unwrap(), now + Duration::days(7));
    }

    #[test]
    fn period_end_past_date_range_is_an_error() {
        let now = Utc::now();
        let plan = Plan {
            plan_id: PlanId::new(2),
            plan_name: "Forever".into(),
            plan_amount: 10,
            price: 10,
            duration_in_days: i32::MAX,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            plan.period_end(now),
            Err(BillingError::InvalidAmount(_))
        ));
        assert!(plan.period_end(DateTime::<Utc>::MAX_UTC).is_err());
    }
}
