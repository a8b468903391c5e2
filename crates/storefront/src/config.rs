//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `TIENDA_SLUG` - Tenant slug, attached to logs and error reports
//! - `TIENDA_API_BASE_URL` - Backend base URL (default: <https://remeraslisas-backend.onrender.com>)
//! - `TIENDA_API_TOKEN` - Bearer token for an already logged-in user
//! - `TIENDA_HTTP_TIMEOUT_SECS` - Per-request timeout in seconds (default: 15)
//! - `TIENDA_TAX_RATE` - Tax rate applied at checkout (default: 0.10)
//! - `TIENDA_CURRENCY` - Currency prices are shown in (default: ARS)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use tienda_core::CurrencyCode;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "https://remeraslisas-backend.onrender.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_TAX_RATE: &str = "0.10";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Backend base URL
    pub api_base_url: Url,
    /// Tenant slug
    pub tienda_slug: Option<String>,
    /// Bearer token for the current user, if already logged in
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Tax rate applied to the subtotal at checkout
    pub tax_rate: Decimal,
    /// Currency prices are shown in
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("tienda_slug", &self.tienda_slug)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("http_timeout", &self.http_timeout)
            .field("tax_rate", &self.tax_rate)
            .field("currency", &self.currency)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid or if the API token
    /// looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_env("TIENDA_API_BASE_URL", DEFAULT_API_BASE_URL)?;
        let tienda_slug = get_optional_env("TIENDA_SLUG");
        let api_token = get_optional_env("TIENDA_API_TOKEN")
            .map(|token| validated_secret(token, "TIENDA_API_TOKEN"))
            .transpose()?;
        let timeout_secs: u64 =
            parse_env("TIENDA_HTTP_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())?;
        let tax_rate: Decimal = parse_env("TIENDA_TAX_RATE", DEFAULT_TAX_RATE)?;
        if tax_rate.is_sign_negative() || tax_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "TIENDA_TAX_RATE".to_string(),
                format!("must be in [0, 1) (got {tax_rate})"),
            ));
        }

        let currency: CurrencyCode = parse_env("TIENDA_CURRENCY", CurrencyCode::default().code())?;

        Ok(Self {
            api_base_url,
            tienda_slug,
            api_token,
            http_timeout: Duration::from_secs(timeout_secs),
            tax_rate,
            currency,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `api_base_url` with defaults for everything else.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            tienda_slug: None,
            api_token: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            tax_rate: Decimal::new(10, 2),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_optional_env(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Reject secrets that look like copy-pasted placeholders.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

fn validated_secret(value: String, key: &str) -> Result<SecretString, ConfigError> {
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
