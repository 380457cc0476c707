//! Wallet-Billing HTTP API Service.
//!
//! This crate provides the HTTP API for the wallet-billing service, including:
//!
//! - Partner, account, wallet and plan management
//! - The wallet ledger (credits, debits, balances, transaction history)
//! - The subscription lifecycle (subscribe, renew, cancel, complete)
//! - Razorpay plan payments
//! - Partner commissions and settlements
//!
//! # Authentication
//!
//! Every endpoint that moves money requires a service API key in the
//! `X-API-Key` header. Gateway payment verification is authenticated by the
//! Razorpay signature instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for a uniform router

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod razorpay;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use razorpay::{RazorpayClient, RazorpayError};
pub use routes::create_router;
pub use state::AppState;
