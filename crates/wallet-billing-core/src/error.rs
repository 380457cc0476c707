//! Error types for wallet-billing.

use crate::ids::IdError;

/// Result type for wallet-billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced record is missing (or a plan is inactive).
    NotFound,
    /// The caller supplied something unusable.
    InvalidArgument,
    /// A debit exceeds the wallet's total balance.
    InsufficientFunds,
    /// A concurrent mutation won; the caller may retry.
    Conflict,
}

/// Errors raised by the ledger and subscription rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Which kind of record was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The plan exists but is not offered any more.
    #[error("invalid or inactive plan: {plan_id}")]
    PlanInactive {
        /// The inactive plan.
        plan_id: i64,
    },

    /// The wallet has nothing to renew or cancel.
    #[error("no active subscription found for wallet {wallet_id}")]
    NoActiveSubscription {
        /// The wallet that was inspected.
        wallet_id: i64,
    },

    /// Transaction type is neither `credit` nor `debit`.
    #[error("invalid transaction type, must be either credit or debit, got: {0}")]
    InvalidTransactionKind(String),

    /// Invalid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Debit exceeds the wallet's total balance.
    #[error("insufficient balance: available={available}, required={required}")]
    InsufficientFunds {
        /// Total balance at the time of the debit.
        available: i64,
        /// Amount that was requested.
        required: i64,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl BillingError {
    /// Shorthand for a missing record.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::PlanInactive { .. } | Self::NoActiveSubscription { .. } => {
                ErrorKind::NotFound
            }
            Self::InvalidTransactionKind(_)
            | Self::InvalidAmount(_)
            | Self::MissingField(_)
            | Self::InvalidId(_) => ErrorKind::InvalidArgument,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(BillingError::not_found("wallet", 1).kind(), ErrorKind::NotFound);
        assert_eq!(
            BillingError::PlanInactive { plan_id: 2 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BillingError::InvalidTransactionKind("refund".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            BillingError::InsufficientFunds {
                available: 0,
                required: 1
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = BillingError::not_found("wallet", 7);
        assert_eq!(err.to_string(), "wallet not found: 7");
    }
}
