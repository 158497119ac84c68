//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PAGARME_SECRET_KEY` - Pagar.me secret API key (server-side only)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `PAGARME_API_URL` - Gateway base URL (default: <https://api.pagar.me/core/v5>)
//! - `PAGARME_STATEMENT_DESCRIPTOR` - Card statement text (default: FILAMENTO3D)
//! - `PAGARME_BOLETO_DUE_DAYS` - Days until a boleto is due (default: 3)
//! - `PAGARME_PIX_EXPIRES_IN` - PIX QR code lifetime in seconds (default: 3600)
//! - `PAGARME_WEBHOOK_USERNAME` / `PAGARME_WEBHOOK_PASSWORD` - Basic auth expected on webhooks
//! - `PRINT_SERVICE_URL` - Slicing/estimation service (default: <http://localhost:5000>)
//! - `PRINT_SERVICE_TIMEOUT_SECS` - Per-request timeout (default: 60)
//! - `PRINTER_WATTAGE` - Printer power draw in watts (default: 200)
//! - `ELECTRICITY_RATE` - BRL per kWh (default: 0.85)
//! - `UPLOAD_MAX_BYTES` - Largest accepted model file (default: 50 MiB)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sampling (default: 1.0 / 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use filamento_core::pricing::EnergyRates;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
    "sua-chave",
    "trocar",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Take the client IP from proxy headers (`cf-connecting-ip`,
    /// `x-real-ip`, `x-forwarded-for`). Only enable behind a proxy that
    /// overwrites them.
    pub trust_proxy_headers: bool,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Pagar.me gateway configuration
    pub pagarme: PagarmeConfig,
    /// Slicing/estimation service configuration
    pub print_service: PrintServiceConfig,
    /// Upload limits
    pub uploads: UploadConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Pagar.me configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PagarmeConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Secret key used for Basic auth
    pub secret_key: SecretString,
    /// Text on the buyer's card statement
    pub statement_descriptor: String,
    /// Days until a boleto is due
    pub boleto_due_days: u32,
    /// PIX QR code lifetime in seconds
    pub pix_expires_in: u32,
    /// Credentials the gateway sends on webhook calls
    pub webhook: Option<WebhookCredentials>,
}

/// Basic auth credentials configured on the gateway's webhook.
#[derive(Clone)]
pub struct WebhookCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for PagarmeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagarmeConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("statement_descriptor", &self.statement_descriptor)
            .field("boleto_due_days", &self.boleto_due_days)
            .field("pix_expires_in", &self.pix_expires_in)
            .field(
                "webhook",
                &self.webhook.as_ref().map(|w| (&w.username, "[REDACTED]")),
            )
            .finish()
    }
}

/// Slicing/estimation service configuration.
#[derive(Debug, Clone)]
pub struct PrintServiceConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Printer power draw and tariff used for pricing
    pub energy: EnergyRates,
}

/// Upload limits.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest accepted model file in bytes
    pub max_bytes: usize,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            trust_proxy_headers: parse_env_or_default("STOREFRONT_TRUST_PROXY_HEADERS", "false")?,
            session_secret,
            pagarme: PagarmeConfig::from_env()?,
            print_service: PrintServiceConfig::from_env()?,
            uploads: UploadConfig {
                max_bytes: parse_env_or_default("UPLOAD_MAX_BYTES", "52428800")?,
            },
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PagarmeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook = match get_optional_env("PAGARME_WEBHOOK_USERNAME") {
            Some(username) => Some(WebhookCredentials {
                username,
                password: get_validated_secret("PAGARME_WEBHOOK_PASSWORD")?,
            }),
            None => None,
        };

        Ok(Self {
            api_url: trim_url(&get_env_or_default(
                "PAGARME_API_URL",
                "https://api.pagar.me/core/v5",
            )),
            secret_key: get_validated_secret("PAGARME_SECRET_KEY")?,
            statement_descriptor: get_env_or_default("PAGARME_STATEMENT_DESCRIPTOR", "FILAMENTO3D"),
            boleto_due_days: parse_env_or_default("PAGARME_BOLETO_DUE_DAYS", "3")?,
            pix_expires_in: parse_env_or_default("PAGARME_PIX_EXPIRES_IN", "3600")?,
            webhook,
        })
    }
}

impl PrintServiceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_env_or_default("PRINT_SERVICE_TIMEOUT_SECS", "60")?;
        Ok(Self {
            base_url: trim_url(&get_env_or_default(
                "PRINT_SERVICE_URL",
                "http://localhost:5000",
            )),
            timeout: Duration::from_secs(timeout_secs),
            energy: EnergyRates {
                printer_watts: parse_env_or_default::<Decimal>("PRINTER_WATTAGE", "200")?,
                electricity_rate: parse_env_or_default::<Decimal>("ELECTRICITY_RATE", "0.85")?,
            },
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
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

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
