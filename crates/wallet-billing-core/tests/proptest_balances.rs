//! Property-based tests for the two-tier balance arithmetic
//!
//! These tests verify the ledger's money rules:
//! - Debits draw down monthly first, then fixed
//! - Debits never overdraw; failures leave balances untouched
//! - Credits raise the total by exactly the amount, always into fixed
//! - Neither component ever goes negative

use proptest::prelude::*;
use wallet_billing_core::{Balances, BillingError, TransactionKind};

// ============================================================================
// Strategies
// ============================================================================

/// Generate a wallet's balance components (kept far from `i64::MAX`)
fn arb_balances() -> impl Strategy<Value = Balances> {
    (0i64..1_000_000_000, 0i64..1_000_000_000)
        .prop_map(|(monthly, fixed)| Balances::new(monthly, fixed).unwrap())
}

/// Generate a positive transaction amount
fn arb_amount() -> impl Strategy<Value = i64> {
    1i64..2_000_000_000
}

fn arb_kind() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![Just(TransactionKind::Credit), Just(TransactionKind::Debit)]
}

// ============================================================================
// Debit Properties
// ============================================================================

proptest! {
    /// Property: a covered debit follows the monthly-first draw-down formula
    #[test]
    fn prop_debit_draws_monthly_first(balances in arb_balances(), amount in arb_amount()) {
        prop_assume!(balances.total() >= amount);

        let after = balances.debit(amount).unwrap();

        prop_assert_eq!(after.monthly, (balances.monthly - amount).max(0));
        prop_assert_eq!(after.fixed, balances.fixed - (amount - balances.monthly).max(0));
        prop_assert_eq!(after.total(), balances.total() - amount);
    }

    /// Property: an uncovered debit fails with the available and required amounts
    #[test]
    fn prop_overdraw_is_rejected(balances in arb_balances(), extra in 1i64..1_000_000) {
        let amount = balances.total() + extra;

        let err = balances.debit(amount).unwrap_err();

        prop_assert_eq!(
            err,
            BillingError::InsufficientFunds { available: balances.total(), required: amount }
        );
    }
}

// ============================================================================
// Credit Properties
// ============================================================================

proptest! {
    /// Property: credits land in fixed and raise the total by exactly the amount
    #[test]
    fn prop_credit_targets_fixed(balances in arb_balances(), amount in arb_amount()) {
        let after = balances.credit(amount).unwrap();

        prop_assert_eq!(after.monthly, balances.monthly);
        prop_assert_eq!(after.fixed, balances.fixed + amount);
        prop_assert_eq!(after.total(), balances.total() + amount);
    }

    /// Property: the same credit applied twice from the same state gives the same result
    #[test]
    fn prop_credit_is_deterministic(balances in arb_balances(), amount in arb_amount()) {
        prop_assert_eq!(balances.credit(amount).unwrap(), balances.credit(amount).unwrap());
    }
}

// ============================================================================
// Sequence Properties
// ============================================================================

proptest! {
    /// Property: any sequence of operations keeps both components non-negative and
    /// the running total equal to the sum of accepted signed amounts
    #[test]
    fn prop_sequences_conserve_balance(
        start in arb_balances(),
        ops in prop::collection::vec((arb_kind(), 1i64..10_000_000), 1..50)
    ) {
        let mut balances = start;
        let mut expected_total = start.total();

        for (kind, amount) in ops {
            match balances.apply(kind, amount) {
                Ok(next) => {
                    expected_total += match kind {
                        TransactionKind::Credit => amount,
                        TransactionKind::Debit => -amount,
                    };
                    balances = next;
                }
                Err(BillingError::InsufficientFunds { .. }) => {
                    prop_assert_eq!(kind, TransactionKind::Debit);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }

            prop_assert!(balances.monthly >= 0);
            prop_assert!(balances.fixed >= 0);
            prop_assert_eq!(balances.total(), expected_total);
        }
    }
}

#[test]
fn worked_example_debit_120_from_100_and_50() {
    let after = Balances::new(100, 50).unwrap().debit(120).unwrap();
    assert_eq!((after.monthly, after.fixed), (0, 30));
}
