//! CLI subcommands.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Errors shared by the database commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(#[from] gift_registry_server::db::RepositoryError),

    #[error("Media error: {0}")]
    Media(#[from] gift_registry_server::media::MediaError),

    #[error("Invalid sample product: {0}")]
    InvalidProduct(#[from] gift_registry_core::FieldError),
}

/// Database URL from `REGISTRY_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("REGISTRY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("REGISTRY_DATABASE_URL"))
}
