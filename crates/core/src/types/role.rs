//! Account roles.

use serde::{Deserialize, Serialize};

use super::email::Email;

/// Role persisted on every user account.
///
/// Assigned once at registration and never re-derived afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "registry.user_role", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Guest who can gift and cancel their own gifts.
    #[default]
    User,
    /// Registry owner who curates the product list.
    Admin,
}

impl Role {
    /// Role for a newly registered account.
    ///
    /// The account is `Admin` only when its address is the configured admin
    /// address. Both sides are normalized `Email`s, so the comparison ignores
    /// case and surrounding whitespace.
    #[must_use]
    pub fn for_registration(email: &Email, admin_email: &Email) -> Self {
        if email == admin_email {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// Whether this role may manage products.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" | "user" => Ok(Self::User),
            "ADMIN" | "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_email_gets_admin_role() {
        let admin = Email::parse("owner@example.org").unwrap();
        let typed = Email::parse("Owner@Example.org").unwrap();
        assert_eq!(Role::for_registration(&typed, &admin), Role::Admin);
    }

    #[test]
    fn test_other_email_gets_user_role() {
        let admin = Email::parse("owner@example.org").unwrap();
        let guest = Email::parse("guest@example.org").unwrap();
        assert_eq!(Role::for_registration(&guest, &admin), Role::User);
    }

    #[test]
    fn test_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("owner".parse::<Role>().is_err());
    }
}
