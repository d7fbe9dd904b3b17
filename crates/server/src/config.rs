//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `REGISTRY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `REGISTRY_BASE_URL` - Public URL of the registry
//! - `REGISTRY_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `ADMIN_EMAIL` - Address that receives the ADMIN role when it registers
//!
//! ## Optional
//! - `REGISTRY_HOST` - Bind address (default: 127.0.0.1)
//! - `REGISTRY_PORT` - Listen port (default: 3000)
//! - `MEDIA_STORE_PATH` - Root directory for uploaded images (default: ./data/media)
//! - `MEDIA_MAX_UPLOAD_BYTES` - Upload size limit (default: 5 MiB)
//! - `REGISTRY_TRUST_PROXY` - Key rate limits on `X-Forwarded-For` / `X-Real-IP`
//!   instead of the peer address (default: false; only behind a proxy)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance traces sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use gift_registry_core::Email;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
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

/// Registry server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Address granted the ADMIN role at registration
    pub admin_email: Email,
    /// Media store configuration
    pub media: MediaConfig,
    /// Whether client IP headers set by a reverse proxy are trusted
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Media store configuration.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Root directory of the disk backend
    pub root: PathBuf,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/media"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
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

        let database_url = get_database_url("REGISTRY_DATABASE_URL")?;
        let host = parse_env("REGISTRY_HOST", "127.0.0.1")?;
        let port = parse_env("REGISTRY_PORT", "3000")?;
        let base_url = get_required_env("REGISTRY_BASE_URL")?;
        let session_secret = get_validated_secret("REGISTRY_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "REGISTRY_SESSION_SECRET")?;

        let admin_email = Email::parse(&get_required_env("ADMIN_EMAIL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_EMAIL".to_string(), e.to_string()))?;

        let media = MediaConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            admin_email,
            media,
            trust_proxy_headers: parse_env("REGISTRY_TRUST_PROXY", "false")?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl MediaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let root = get_optional_env("MEDIA_STORE_PATH").map_or(defaults.root, PathBuf::from);
        let max_upload_bytes = match get_optional_env("MEDIA_MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidEnvVar("MEDIA_MAX_UPLOAD_BYTES".to_string(), e.to_string())
            })?,
            None => defaults.max_upload_bytes,
        };
        Ok(Self {
            root,
            max_upload_bytes,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

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

/// Parse an environment variable, falling back to a default literal.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_uniform_string_is_zero() {
        assert!(shannon_entropy("zzzzzz").abs() < f64::EPSILON);
        assert!(shannon_entropy("").abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_random_string_is_high() {
        assert!(shannon_entropy("Qm7#vR2!kP9@wX4$") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = validate_secret_strength("changeme-registry-key", "REGISTRY_SESSION_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(var, _) if var == "REGISTRY_SESSION_SECRET"));
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        assert!(validate_secret_strength(&"ab".repeat(20), "K").is_err());
    }

    #[test]
    fn test_strong_secret_accepted() {
        assert!(validate_secret_strength("Zt8&Lq3!Vn6#Rb1@Hw5*Km9^Pd2%Gx7", "K").is_ok());
    }

    #[test]
    fn test_short_session_secret_rejected() {
        let secret = SecretString::from("Zt8&Lq3!");
        assert!(validate_session_secret(&secret, "K").is_err());
        let secret = SecretString::from("Zt8&Lq3!".repeat(4));
        assert!(validate_session_secret(&secret, "K").is_ok());
    }

    #[test]
    fn test_secure_cookies_follow_base_url_scheme() {
        let mut config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/registry"),
            host: "0.0.0.0".parse().unwrap(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            admin_email: Email::parse("owner@registry.test").unwrap(),
            media: MediaConfig::default(),
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        assert!(!config.is_secure());
        assert_eq!(config.socket_addr().port(), 8080);

        config.base_url = "https://registry.test".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_media_defaults() {
        let media = MediaConfig::default();
        assert_eq!(media.max_upload_bytes, 5 * 1024 * 1024);
        assert!(media.root.ends_with("media"));
    }
}
