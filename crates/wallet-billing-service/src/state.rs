//! Application state.

use std::sync::Arc;

use wallet_billing_store::Store;

use crate::config::ServiceConfig;
use crate::razorpay::RazorpayClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Razorpay client for plan payments (optional).
    pub razorpay: Option<Arc<RazorpayClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let razorpay = config
            .razorpay_key_id
            .as_ref()
            .zip(config.razorpay_key_secret.as_ref())
            .and_then(|(key_id, key_secret)| {
                match RazorpayClient::new(key_id, key_secret, &config.razorpay_api_url) {
                    Ok(client) => {
                        tracing::info!(api_url = %config.razorpay_api_url, "Razorpay integration enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create Razorpay client");
                        None
                    }
                }
            });

        if razorpay.is_none() {
            tracing::warn!("Razorpay not configured - payments will not be available");
        }

        Self {
            store,
            config,
            razorpay,
        }
    }

    /// Check if Razorpay is configured.
    #[must_use]
    pub fn has_razorpay(&self) -> bool {
        self.razorpay.is_some()
    }
}
