//! Outcome kinds shared by the gift and product services.

use std::fmt;

use gift_registry_core::{FieldError, ProductField};
use thiserror::Error;

use crate::db::RepositoryError;

/// Failure of a core registry operation.
///
/// Every gift or product operation returns either its result or exactly one
/// of these. The message is user-facing; callers match on [`ErrorKind`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No caller identity was supplied.
    #[error("{0}")]
    Unauthenticated(String),

    /// The caller lacks the required role.
    #[error("access denied")]
    Forbidden,

    /// The target record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A submitted field is invalid; nothing was written.
    #[error("{message}")]
    Validation {
        field: ProductField,
        message: String,
    },

    /// The product has no remaining units to gift.
    #[error("item already fully gifted")]
    AlreadyFulfilled,

    /// Store or infrastructure failure; nothing was committed.
    #[error("{0}")]
    Internal(String),
}

/// Discriminant of [`RegistryError`], stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    Validation,
    AlreadyFulfilled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::AlreadyFulfilled => "already_fulfilled",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl RegistryError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::AlreadyFulfilled => ErrorKind::AlreadyFulfilled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable message, safe to show to the caller.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Internal(_) => "something went wrong, please try again".to_owned(),
            other => other.to_string(),
        }
    }

    pub(crate) fn validation(field: ProductField, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<FieldError> for RegistryError {
    fn from(err: FieldError) -> Self {
        Self::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<RepositoryError> for RegistryError {
    fn from(err: RepositoryError) -> Self {
        Self::Internal(err.to_string())
    }
}
