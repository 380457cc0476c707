//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use wallet_billing_core::{BillingError, ErrorKind, IdError};
use wallet_billing_store::StoreError;

use crate::razorpay::RazorpayError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid service key.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - duplicate record or a concurrent mutation won.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Debit exceeds the wallet's total balance.
    #[error("insufficient balance: available={available}, required={required}")]
    InsufficientFunds {
        /// Total balance.
        available: i64,
        /// Requested amount.
        required: i64,
    },

    /// Payment signature did not verify.
    #[error("invalid payment signature")]
    InvalidSignature,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientFunds {
                available,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "required": required
                })),
            ),
            Self::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InsufficientFunds {
                available,
                required,
            } => Self::InsufficientFunds {
                available,
                required,
            },
            other => match other.kind() {
                ErrorKind::NotFound => Self::NotFound(other.to_string()),
                ErrorKind::Conflict => Self::Conflict(other.to_string()),
                ErrorKind::InvalidArgument | ErrorKind::InsufficientFunds => {
                    Self::BadRequest(other.to_string())
                }
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Billing(err) => err.into(),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Database(msg) | StoreError::CorruptRow(msg) => Self::Internal(msg),
        }
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(format!("invalid identifier: {err}"))
    }
}

impl From<RazorpayError> for ApiError {
    fn from(err: RazorpayError) -> Self {
        match err {
            RazorpayError::InvalidSignature => Self::InvalidSignature,
            RazorpayError::Configuration(msg) => Self::Internal(msg),
            other => Self::ExternalService(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn billing_errors_map_to_status_codes() {
        assert_eq!(
            status_of(BillingError::not_found("wallet", 1).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BillingError::PlanInactive { plan_id: 2 }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BillingError::InvalidAmount("must be positive".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                BillingError::InsufficientFunds {
                    available: 1,
                    required: 2
                }
                .into()
            ),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn store_errors_map_to_status_codes() {
        assert_eq!(
            status_of(StoreError::Conflict("duplicate".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Database("connection reset".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn gateway_errors_map_to_status_codes() {
        assert_eq!(
            status_of(RazorpayError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                RazorpayError::Api {
                    code: "SERVER_ERROR".into(),
                    description: "down".into(),
                    status: 500
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }
}
