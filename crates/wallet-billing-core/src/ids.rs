//! Identifier types for wallet-billing.
//!
//! Every table is keyed by a database serial (`BIGSERIAL`). Each key gets its own
//! newtype so a `PlanId` can never be passed where a `WalletId` is expected.
//!
//! # Macro-based ID Types
//!
//! The `serial_id_type!` macro reduces boilerplate for serial identifier types,
//! ensuring consistent implementation of serialization, parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define a serial identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `i64` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - `Serialize`, `Deserialize` (as a bare JSON number)
/// - `FromStr`, `Display`, `Debug`
/// - `From<$name> for i64`
///
/// # Example
///
/// ```ignore
/// serial_id_type!(MyId, "A custom identifier type.");
/// let id = MyId::new(7);
/// let parsed: MyId = id.to_string().parse().unwrap();
/// ```
macro_rules! serial_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database key.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Return the raw database key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value: i64 = s.trim().parse().map_err(|_| IdError::NotANumber)?;
                if value <= 0 {
                    return Err(IdError::NotPositive(value));
                }
                Ok(Self(value))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

serial_id_type!(PartnerId, "A partner (reseller) identifier.");
serial_id_type!(AccountId, "An account identifier. Accounts own wallets.");
serial_id_type!(WalletId, "A wallet identifier.\n\nThe wallet is the unit of locking for every balance change.");
serial_id_type!(TransactionId, "A wallet transaction identifier.\n\nAssigned by the store; monotonically increasing per store.");
serial_id_type!(PlanId, "A subscription plan identifier.");
serial_id_type!(FeatureId, "A plan feature identifier.");
serial_id_type!(SubscriptionId, "A subscription identifier.");
serial_id_type!(HistoryId, "A subscription history entry identifier.");
serial_id_type!(PartnerTransactionId, "A partner commission record identifier.");
serial_id_type!(SettlementId, "A partner settlement identifier.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not an integer.
    #[error("identifier is not a number")]
    NotANumber,

    /// Serial keys start at 1.
    #[error("identifier must be positive, got {0}")]
    NotPositive(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_id_roundtrip() {
        let id = WalletId::new(42);
        let parsed = WalletId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(i64::from(parsed), 42);
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&PlanId::new(9)).unwrap();
        assert_eq!(json, "9");

        let parsed: SubscriptionId = serde_json::from_str("17").unwrap();
        assert_eq!(parsed.get(), 17);
    }

    #[test]
    fn parse_rejects_garbage_and_non_positive() {
        assert_eq!(WalletId::from_str("abc"), Err(IdError::NotANumber));
        assert_eq!(WalletId::from_str("0"), Err(IdError::NotPositive(0)));
        assert_eq!(WalletId::from_str("-3"), Err(IdError::NotPositive(-3)));
        assert_eq!(WalletId::from_str(" 5 ").unwrap().get(), 5);
    }

    #[test]
    fn debug_names_the_type() {
        assert_eq!(format!("{:?}", TransactionId::new(3)), "TransactionId(3)");
    }
}
