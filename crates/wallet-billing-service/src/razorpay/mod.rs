//! Razorpay integration for plan payments.
//!
//! Razorpay handles:
//! - Order creation for a plan's price
//! - Checkout signature verification (see [`crate::crypto`])

pub mod client;
pub mod types;

pub use client::RazorpayClient;
pub use client::RazorpayError;
pub use types::*;
