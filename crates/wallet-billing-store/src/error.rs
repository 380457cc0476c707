//! Error types for wallet-billing storage.

use wallet_billing_core::{BillingError, ErrorKind};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A ledger or subscription rule rejected the operation.
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// A concurrent mutation won (serialization failure, deadlock, unique violation).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be mapped back to a domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    /// Classify the error; `None` means an internal failure.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Billing(err) => Some(err.kind()),
            Self::Conflict(_) => Some(ErrorKind::Conflict),
            Self::Database(_) | Self::CorruptRow(_) => None,
        }
    }
}

/// SQLSTATE codes that mean "someone else got there first".
const CONFLICT_STATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "23505", // unique_violation
];

/// SQLSTATE `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let code = db.code();
            if code
                .as_deref()
                .is_some_and(|code| CONFLICT_STATES.contains(&code))
            {
                return Self::Conflict(db.message().to_string());
            }
            if code.as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                let constraint = db.constraint().unwrap_or("unknown constraint");
                return Self::Billing(BillingError::not_found("referenced row", constraint));
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_keep_their_kind() {
        let err = StoreError::from(BillingError::not_found("wallet", 1));
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.to_string(), "wallet not found: 1");
    }

    #[test]
    fn database_errors_are_internal() {
        assert_eq!(StoreError::Database("boom".into()).kind(), None);
        assert_eq!(
            StoreError::Conflict("retry".into()).kind(),
            Some(ErrorKind::Conflict)
        );
    }

    #[test]
    fn row_not_found_is_internal() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
