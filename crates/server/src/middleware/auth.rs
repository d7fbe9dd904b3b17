//! Authentication extractors and session helpers.
//!
//! Handlers that act on behalf of a user take one of these extractors and
//! turn the session's [`CurrentUser`] into an explicit
//! [`Caller`](crate::services::Caller) for the services.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::CurrentUser;
use crate::models::session::keys;

/// Extractor that requires a signed-in user.
///
/// If the user is not logged in, returns a redirect to the login page, or 401
/// for `/api/` paths.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
///
/// Non-admins are sent back to `/` (403 for `/api/` paths).
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when an extractor's requirement is not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Redirect to the gift list (for HTML requests by non-admins).
    RedirectToRoot,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Forbidden response (for API requests by non-admins).
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::RedirectToRoot => Redirect::to("/").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn is_api(parts: &Parts) -> bool {
    parts.uri.path().starts_with("/api/")
}

/// Read the signed-in user from a session, if any.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

async fn user_from_parts(parts: &Parts) -> Option<CurrentUser> {
    match parts.extensions.get::<Session>() {
        Some(session) => current_user(session).await,
        None => None,
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match user_from_parts(parts).await {
            Some(user) => Ok(Self(user)),
            None if is_api(parts) => Err(AuthRejection::Unauthorized),
            None => Err(AuthRejection::RedirectToLogin),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if user.is_admin() {
            return Ok(Self(user));
        }
        if is_api(parts) {
            Err(AuthRejection::Forbidden)
        } else {
            Err(AuthRejection::RedirectToRoot)
        }
    }
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled first so a pre-login session cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Clear the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
