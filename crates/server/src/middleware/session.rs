//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! cookie is signed with a key derived from `REGISTRY_SESSION_SECRET`.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ServerConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "registry_session";

/// Schema and table holding session records (created by migration).
const SESSION_SCHEMA: &str = "registry";
const SESSION_TABLE: &str = "session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Error building the session layer.
#[derive(Debug, thiserror::Error)]
#[error("invalid session store name: {0}")]
pub struct SessionConfigError(String);

/// Derive the 64-byte cookie signing key from the configured secret.
#[must_use]
pub fn signing_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
///
/// # Errors
///
/// Returns `SessionConfigError` if the schema or table name is rejected by
/// the store.
pub fn create_session_layer(
    pool: &PgPool,
    config: &ServerConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, SessionConfigError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)
        .map_err(SessionConfigError)?
        .with_table_name(SESSION_TABLE)
        .map_err(SessionConfigError)?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let secret = SecretString::from("Zt8&Lq3!Vn6#Rb1@Hw5*Km9^Pd2%Gx7");
        let a = signing_key(&secret);
        let b = signing_key(&secret);
        assert_eq!(a.master(), b.master());
        assert_eq!(a.master().len(), 64);
    }

    #[test]
    fn test_different_secrets_give_different_keys() {
        let a = signing_key(&SecretString::from("first-secret-value-0123456789abcdef"));
        let b = signing_key(&SecretString::from("second-secret-value-0123456789abcdef"));
        assert_ne!(a.master(), b.master());
    }
}
