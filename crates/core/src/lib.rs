//! Gift Registry Core - Shared domain types.
//!
//! This crate provides the types shared by every gift registry component:
//! - `server` - Web application (public gift list, admin dashboard)
//! - `cli` - Command-line tools for migrations and seeding
//! - `integration-tests` - End-to-end service tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. The gift quantity transition and product field validation
//! live here so every store implementation enforces them identically.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles, blob keys and product rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
