//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    accounts, health, partners, payments, plans, settlements, subscriptions, wallets,
};
use crate::state::AppState;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent requests for gateway-backed payment endpoints.
const PAYMENT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Catalog
/// - `POST /v1/partners`, `GET /v1/partners`, `GET /v1/partners/:id`
/// - `POST /v1/accounts`, `GET /v1/accounts/:id`
/// - `POST /v1/plans` (auth), `GET /v1/plans`, `GET /v1/plans/:id`
/// - `POST /v1/plans/:id/features`, `GET /v1/plans/:id/features`
///
/// ## Wallets (money movement needs Service API Key auth)
/// - `POST /v1/wallets`, `GET /v1/wallets/:id`, `GET /v1/wallets/:id/balance`
/// - `GET /v1/wallets/:id/transactions`, `POST /v1/wallets/:id/transactions` (auth)
/// - `POST /v1/wallets/:id/subscription` (auth) - Subscribe
/// - `POST /v1/wallets/:id/subscription/renew` (auth) - Renew
/// - `POST /v1/wallets/:id/subscription/cancel` (auth) - Cancel
/// - `GET /v1/wallets/:id/subscription/history`
///
/// ## Subscriptions
/// - `POST /v1/subscriptions` - Create an unbilled shell
/// - `GET /v1/subscriptions/:id`
/// - `POST /v1/subscriptions/:id/complete` (auth) - Bill and activate
///
/// ## Partner payouts
/// - `POST /v1/partner-transactions`, `POST /v1/settlements`
///
/// ## Payments (Razorpay, rate-limited)
/// - `POST /v1/payments/orders` - Create an order for a wallet and plan
/// - `POST /v1/payments/verify` (auth) - Verify a paid order and subscribe once
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Payment endpoints wait on the gateway, so they get a tighter limit.
    let payment_routes = Router::new()
        .route("/orders", post(payments::create_order))
        .route("/verify", post(payments::verify_payment))
        .layer(ConcurrencyLimitLayer::new(PAYMENT_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Partners
        .route(
            "/partners",
            post(partners::create_partner).get(partners::list_partners),
        )
        .route("/partners/:id", get(partners::get_partner))
        // Accounts
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/:id", get(accounts::get_account))
        // Wallets and ledger
        .route("/wallets", post(wallets::create_wallet))
        .route("/wallets/:id", get(wallets::get_wallet))
        .route("/wallets/:id/balance", get(wallets::get_balance))
        .route(
            "/wallets/:id/transactions",
            get(wallets::list_transactions).post(wallets::post_transaction),
        )
        // Wallet subscription lifecycle
        .route("/wallets/:id/subscription", post(wallets::subscribe))
        .route("/wallets/:id/subscription/renew", post(wallets::renew))
        .route("/wallets/:id/subscription/cancel", post(wallets::cancel))
        .route(
            "/wallets/:id/subscription/history",
            get(wallets::subscription_history),
        )
        // Plans
        .route("/plans", post(plans::create_plan).get(plans::list_plans))
        .route("/plans/:id", get(plans::get_plan))
        .route(
            "/plans/:id/features",
            post(plans::create_feature).get(plans::list_features),
        )
        // Subscription records
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route("/subscriptions/:id", get(subscriptions::get_subscription))
        .route(
            "/subscriptions/:id/complete",
            post(subscriptions::complete_subscription),
        )
        // Partner payouts
        .route(
            "/partner-transactions",
            post(settlements::create_partner_transaction),
        )
        .route("/settlements", post(settlements::create_settlement))
        // Payments (with their own concurrency limit)
        .nest("/payments", payment_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
