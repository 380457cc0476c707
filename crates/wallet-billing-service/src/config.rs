//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Default Razorpay REST endpoint.
pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// `PostgreSQL` connection string. The in-memory store is used when unset.
    pub database_url: Option<String>,

    /// Connection pool size (default: 10).
    pub database_max_connections: u32,

    /// Apply embedded migrations on startup (default: true).
    pub run_migrations: bool,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Razorpay key id (optional).
    pub razorpay_key_id: Option<String>,

    /// Razorpay key secret (optional).
    pub razorpay_key_secret: Option<String>,

    /// Razorpay API base URL.
    pub razorpay_api_url: String,

    /// ISO currency code for gateway orders (default: "INR").
    pub currency: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Razorpay secrets file structure.
#[derive(Debug, Deserialize)]
struct RazorpaySecrets {
    key_id: String,
    key_secret: String,
    #[serde(default)]
    api_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load Razorpay secrets from file first, then fall back to env vars
        let (razorpay_key_id, razorpay_key_secret, secrets_api_url) = load_razorpay_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            razorpay_key_id,
            razorpay_key_secret,
            razorpay_api_url: std::env::var("RAZORPAY_API_URL")
                .ok()
                .or(secrets_api_url)
                .unwrap_or_else(|| DEFAULT_RAZORPAY_API_URL.into()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "INR".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Whether both Razorpay credentials are present.
    #[must_use]
    pub fn razorpay_configured(&self) -> bool {
        self.razorpay_key_id.is_some() && self.razorpay_key_secret.is_some()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load Razorpay secrets from file or environment.
fn load_razorpay_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/razorpay.json",
        "wallet-billing/.secrets/razorpay.json",
        "../.secrets/razorpay.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<RazorpaySecrets>(path) {
            tracing::info!(path = %path, "Loaded Razorpay secrets from file");
            return (
                Some(secrets.key_id),
                Some(secrets.key_secret),
                secrets.api_url,
            );
        }
    }

    tracing::debug!("Razorpay secrets file not found, using environment variables");
    (
        std::env::var("RAZORPAY_KEY_ID").ok(),
        std::env::var("RAZORPAY_KEY_SECRET").ok(),
        None,
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            run_migrations: true,
            service_api_key: None,
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_api_url: DEFAULT_RAZORPAY_API_URL.into(),
            currency: "INR".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn default_has_no_gateway() {
        let config = ServiceConfig::default();
        assert!(!config.razorpay_configured());
        assert_eq!(config.currency, "INR");
        assert_eq!(config.razorpay_api_url, DEFAULT_RAZORPAY_API_URL);
    }

    #[test]
    fn gateway_needs_both_credentials() {
        let config = ServiceConfig {
            razorpay_key_id: Some("rzp_test_key".into()),
            ..ServiceConfig::default()
        };
        assert!(!config.razorpay_configured());

        let config = ServiceConfig {
            razorpay_key_secret: Some("secret".into()),
            ..config
        };
        assert!(config.razorpay_configured());
    }

    #[test]
    fn missing_secrets_file_is_not_found() {
        let err = load_secrets_file::<RazorpaySecrets>("does/not/exist.json").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
