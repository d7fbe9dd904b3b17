//! Core types for the gift registry.
//!
//! This module provides type-safe wrappers for the registry's domain concepts.

pub mod blob_key;
pub mod email;
pub mod id;
pub mod product;
pub mod role;

pub use blob_key::{BlobKey, BlobKeyError};
pub use email::{Email, EmailError};
pub use id::*;
pub use product::{
    FieldError, ProductDraft, ProductField, Quantity, QuantityError, ValidProduct,
};
pub use role::Role;
