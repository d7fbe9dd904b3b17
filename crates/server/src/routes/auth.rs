//! Authentication route handlers.
//!
//! Password login, registration (HTML form and JSON API) and logout. The
//! HTML handlers report failures through short error codes in the redirect
//! URL, which the pages turn back into messages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{error, instrument, warn};

use gift_registry_core::{Email, Role, UserId};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// JSON registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// JSON view of a registered user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<&'static str>,
}

/// Message for an error code carried in a redirect URL.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "session" => "Could not start your session, please try again.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "invalid_email" => "Please enter a valid email address.",
        "email_taken" => "That email is already registered.",
        _ => "Something went wrong, please try again.",
    }
}

/// Message for a success code carried in a redirect URL.
fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "registered" => Some("Account created. You can now sign in."),
        "logged_out" => Some("You have been signed out."),
        _ => None,
    }
}

/// Error code for a failed registration.
const fn registration_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidEmail(_) => "invalid_email",
        AuthError::WeakPassword(_) => "password_too_short",
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::InvalidCredentials | AuthError::Repository(_) | AuthError::PasswordHash => {
            "failed"
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().and_then(success_message),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth = AuthService::new(state.pool(), &state.config().admin_email);

    let user = match auth.login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(e) if e.is_client_error() => {
            warn!("Login failed: {}", e);
            return Redirect::to("/login?error=credentials").into_response();
        }
        Err(e) => {
            error!("Login error: {}", e);
            return Redirect::to("/login?error=failed").into_response();
        }
    };

    let current_user = CurrentUser {
        id: user.id,
        email: user.email,
        role: user.role,
    };

    if let Err(e) = set_current_user(&session, &current_user).await {
        error!("Failed to set session: {}", e);
        return Redirect::to("/login?error=session").into_response();
    }
    set_sentry_user(&current_user.id, Some(current_user.email.as_str()));

    let target = if current_user.is_admin() { "/dashboard" } else { "/" };
    Redirect::to(target).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle registration form submission.
///
/// Does not sign the new user in; they are sent to the login page.
#[instrument(skip(state, form))]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    if form.password != form.password_confirm {
        return Redirect::to("/register?error=password_mismatch").into_response();
    }

    let auth = AuthService::new(state.pool(), &state.config().admin_email);
    match auth.register(&form.email, &form.password).await {
        Ok(_) => Redirect::to("/login?success=registered").into_response(),
        Err(e) => {
            if e.is_client_error() {
                warn!("Registration rejected: {}", e);
            } else {
                error!("Registration failed: {}", e);
            }
            let url = format!("/register?error={}", registration_error_code(&e));
            Redirect::to(&url).into_response()
        }
    }
}

/// JSON registration.
///
/// Returns `201 Created` with the new user, `409` for a taken email and
/// `400` for an invalid email or weak password.
#[instrument(skip(state, request))]
pub async fn api_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let auth = AuthService::new(state.pool(), &state.config().admin_email);
    let user = auth.register(&request.email, &request.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and discard the session.
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_current_user(&session).await {
        error!("Failed to clear session: {}", e);
    }
    clear_sentry_user();
    Redirect::to("/login?success=logged_out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_codes_fall_back() {
        assert_eq!(error_message("credentials"), "Invalid email or password.");
        assert_eq!(
            error_message("<script>"),
            "Something went wrong, please try again."
        );
        assert_eq!(success_message("anything"), None);
    }

    #[test]
    fn test_registration_error_codes() {
        assert_eq!(
            registration_error_code(&AuthError::UserAlreadyExists),
            "email_taken"
        );
        assert_eq!(
            registration_error_code(&AuthError::WeakPassword("short".to_string())),
            "password_too_short"
        );
        assert_eq!(registration_error_code(&AuthError::PasswordHash), "failed");
    }
}
