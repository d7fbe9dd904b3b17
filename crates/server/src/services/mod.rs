//! Core registry services.
//!
//! # Services
//!
//! - `gifts` - Gift and cancel-gift transitions
//! - `products` - Product create/update/delete with media cleanup
//! - `auth` - Registration and password login
//!
//! The gift and product services take the caller as an explicit
//! `Option<&Caller>` and re-check authorization themselves; the access gate in
//! front of the routes is only a perimeter check.

pub mod auth;
mod error;
pub mod gifts;
pub mod products;

pub use error::{ErrorKind, RegistryError};
pub use gifts::GiftService;
pub use products::ProductService;

use gift_registry_core::{Role, UserId};

use crate::models::CurrentUser;

/// Identity of the user invoking a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&CurrentUser> for Caller {
    fn from(user: &CurrentUser) -> Self {
        Self::new(user.id, user.role)
    }
}
