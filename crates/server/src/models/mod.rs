//! Domain models for the registry server.
//!
//! These are validated domain objects, separate from the `sqlx` row types in
//! [`crate::db`].

pub mod product;
pub mod session;
pub mod user;

pub use product::{Gift, Product};
pub use session::CurrentUser;
pub use user::User;
