//! Gateway payments applied to wallets.
//!
//! A verified gateway payment subscribes a wallet exactly once. The payment
//! row is written in the same unit of work as the subscription it paid for;
//! its `payment_id` (and `order_id`) are unique, so a replayed payment fails
//! instead of crediting the wallet again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlanId, SubscriptionId, WalletId};

/// A payment that has been redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// Gateway payment ID (`pay_...`).
    pub payment_id: String,
    /// Gateway order ID (`order_...`).
    pub order_id: String,
    /// Wallet that was subscribed.
    pub wallet_id: WalletId,
    /// Plan that was paid for.
    pub plan_id: PlanId,
    /// Subscription the payment activated.
    pub subscription_id: SubscriptionId,
    /// Amount captured by the gateway (minor units).
    pub amount: i64,
    /// When the payment was redeemed.
    pub created_at: DateTime<Utc>,
}

/// A verified payment about to be redeemed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGatewayPayment {
    /// Gateway payment ID.
    pub payment_id: String,
    /// Gateway order ID.
    pub order_id: String,
    /// Wallet to subscribe.
    pub wallet_id: WalletId,
    /// Plan paid for.
    pub plan_id: PlanId,
    /// Amount captured.
    pub amount: i64,
}

impl NewGatewayPayment {
    /// Bind the payment to the subscription it activated.
    #[must_use]
    pub fn redeemed(
        self,
        subscription_id: SubscriptionId,
        now: DateTime<Utc>,
    ) -> GatewayPayment {
        GatewayPayment {
            payment_id: self.payment_id,
            order_id: self.order_id,
            wallet_id: self.wallet_id,
            plan_id: self.plan_id,
            subscription_id,
            amount: self.amount,
            created_at: now,
        }
    }
}
