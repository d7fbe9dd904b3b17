//! User domain types.

use chrono::{DateTime, Utc};

use gift_registry_core::{Email, Role, UserId};

/// A registry account (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Role assigned at registration.
    pub role: Role,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
}
