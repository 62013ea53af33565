//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_IDENTITY_URL` - Base URL of the customer identity endpoint
//! - `CART_ORDERS_URL` - Base URL of the order/discount service
//! - `CART_API_TOKEN` - Bearer token for the order and recovery APIs
//!
//! ## Optional
//! - `CART_RECOVERY_URL` - Base URL of the recovery notifier (abandonment
//!   events are dropped when unset)
//! - `CART_CACHE_NAMESPACE` - Cache key namespace (default: pp)
//! - `CART_CACHE_VERSION` - Cache version tag (default: the compiled-in
//!   [`crate::cache::CACHE_VERSION`])
//! - `CART_CURRENCY` - Store currency code (default: USD)
//! - `CART_TAX_RATE` - Decimal tax rate, e.g. 0.0875 (default: 0)
//! - `CART_ABANDON_AFTER_SECS` - Inactivity window before a cart counts as
//!   abandoned (default: 1800)
//! - `CART_STORAGE_PATH` - Path for the file-backed store (default:
//!   in-memory)

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use prickly_pear_core::CurrencyCode;

use crate::cache::{CACHE_VERSION, CacheSettings};

const MIN_API_TOKEN_LENGTH: usize = 16;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Remote collaborator endpoints and credentials.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL of the customer identity endpoint.
    pub identity_url: Url,
    /// Base URL of the order/discount service.
    pub orders_url: Url,
    /// Base URL of the recovery notifier, if outreach is configured.
    pub recovery_url: Option<Url>,
    /// Bearer token for the order and recovery APIs.
    pub api_token: SecretString,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("identity_url", &self.identity_url.as_str())
            .field("orders_url", &self.orders_url.as_str())
            .field("recovery_url", &self.recovery_url.as_ref().map(Url::as_str))
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

/// Tunables the cart engine itself consumes.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Store currency.
    pub currency: CurrencyCode,
    /// Tax rate applied to the discounted subtotal.
    pub tax_rate: Decimal,
    /// Inactivity window after which a cart counts as abandoned.
    pub abandon_after: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::USD,
            tax_rate: Decimal::ZERO,
            abandon_after: Duration::from_secs(30 * 60),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache namespace and version tag.
    pub cache: CacheSettings,
    /// Engine tunables.
    pub engine: EngineSettings,
    /// File-backed storage path; `None` means in-memory only.
    pub storage_path: Option<PathBuf>,
    /// Remote collaborator configuration.
    pub remote: RemoteConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid,
    /// or if the API token fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let cache = CacheSettings {
            namespace: get_env_or_default("CART_CACHE_NAMESPACE", "pp"),
            version: get_env_or_default("CART_CACHE_VERSION", CACHE_VERSION),
        };

        let engine = EngineSettings {
            currency: parse_currency("CART_CURRENCY", &get_env_or_default("CART_CURRENCY", "USD"))?,
            tax_rate: parse_tax_rate(
                "CART_TAX_RATE",
                &get_env_or_default("CART_TAX_RATE", "0"),
            )?,
            abandon_after: Duration::from_secs(
                get_env_or_default("CART_ABANDON_AFTER_SECS", "1800")
                    .parse::<u64>()
                    .map_err(|e| {
                        ConfigError::InvalidEnvVar(
                            "CART_ABANDON_AFTER_SECS".to_owned(),
                            e.to_string(),
                        )
                    })?,
            ),
        };

        let storage_path = get_optional_env("CART_STORAGE_PATH").map(PathBuf::from);

        let remote = RemoteConfig {
            identity_url: parse_url("CART_IDENTITY_URL", &get_required_env("CART_IDENTITY_URL")?)?,
            orders_url: parse_url("CART_ORDERS_URL", &get_required_env("CART_ORDERS_URL")?)?,
            recovery_url: get_optional_env("CART_RECOVERY_URL")
                .map(|raw| parse_url("CART_RECOVERY_URL", &raw))
                .transpose()?,
            api_token: get_validated_token("CART_API_TOKEN")?,
        };

        Ok(Self {
            cache,
            engine,
            storage_path,
            remote,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(var.to_owned(), e.to_string()))
}

fn parse_currency(var: &str, raw: &str) -> Result<CurrencyCode, ConfigError> {
    match raw {
        "USD" => Ok(CurrencyCode::USD),
        "EUR" => Ok(CurrencyCode::EUR),
        "GBP" => Ok(CurrencyCode::GBP),
        "CAD" => Ok(CurrencyCode::CAD),
        "AUD" => Ok(CurrencyCode::AUD),
        other => Err(ConfigError::InvalidEnvVar(
            var.to_owned(),
            format!("unsupported currency code: {other}"),
        )),
    }
}

fn parse_tax_rate(var: &str, raw: &str) -> Result<Decimal, ConfigError> {
    let rate = raw
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(var.to_owned(), e.to_string()))?;
    if rate.is_sign_negative() || rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            var.to_owned(),
            format!("tax rate must be in [0, 1), got {rate}"),
        ));
    }
    Ok(rate)
}

/// Validate that a token is not a placeholder and meets the length floor.
fn validate_token_strength(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_API_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {MIN_API_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate the API token from environment.
fn get_validated_token(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_token_strength(&value, key)?;
    Ok(SecretString::from(value))
}
