//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! gr-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `REGISTRY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time.

use gift_registry_server::db;
use tracing::info;

use super::{CommandError, database_url};

/// Run the registry migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails to apply.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to registry database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running registry migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Registry migrations complete!");
    Ok(())
}
