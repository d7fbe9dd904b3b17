//! Access control gate.
//!
//! A perimeter check run before handlers: it decides from the path and the
//! session user alone whether the request may proceed. Services still check
//! authorization on every operation.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::debug;

use super::auth::current_user;
use crate::models::CurrentUser;

/// Path prefixes only admins may reach.
const ADMIN_PREFIXES: &[&str] = &["/dashboard", "/api/admin"];

/// Path prefixes that need a signed-in user of any role.
const AUTHENTICATED_PREFIXES: &[&str] = &["/gifts"];

/// Who may reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Public,
    Authenticated,
    Admin,
}

/// What the gate does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    RedirectToLogin,
    RedirectToRoot,
}

/// Whether `path` is `prefix` itself or lies below it.
///
/// `/dashboardx` is not under `/dashboard`.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Scope of a request path.
#[must_use]
pub fn scope_of(path: &str) -> RouteScope {
    if ADMIN_PREFIXES.iter().any(|p| is_under(path, p)) {
        RouteScope::Admin
    } else if path == "/" || AUTHENTICATED_PREFIXES.iter().any(|p| is_under(path, p)) {
        RouteScope::Authenticated
    } else {
        RouteScope::Public
    }
}

/// Classify a request.
///
/// - no user on a protected route: login
/// - non-admin on an admin route: root
/// - otherwise: proceed
#[must_use]
pub fn classify(path: &str, user: Option<&CurrentUser>) -> GateDecision {
    match (scope_of(path), user) {
        (RouteScope::Public, _) => GateDecision::Proceed,
        (_, None) => GateDecision::RedirectToLogin,
        (RouteScope::Admin, Some(user)) if !user.is_admin() => GateDecision::RedirectToRoot,
        (_, Some(_)) => GateDecision::Proceed,
    }
}

/// Middleware applying [`classify`] to every request.
///
/// Must run inside the session layer.
pub async fn access_gate_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let user = match request.extensions().get::<Session>() {
        Some(session) => current_user(session).await,
        None => None,
    };

    match classify(&path, user.as_ref()) {
        GateDecision::Proceed => next.run(request).await,
        GateDecision::RedirectToLogin => {
            debug!(%path, "Unauthenticated request, redirecting to login");
            Redirect::to("/login").into_response()
        }
        GateDecision::RedirectToRoot => {
            debug!(%path, "Non-admin request to admin route, redirecting");
            Redirect::to("/").into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gift_registry_core::{Email, Role, UserId};

    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("guest@registry.test").unwrap(),
            role,
        }
    }

    #[test]
    fn test_anonymous_redirected_to_login_on_protected_routes() {
        for path in ["/", "/dashboard", "/dashboard/products/3/edit", "/api/admin/upload", "/gifts/4"] {
            assert_eq!(classify(path, None), GateDecision::RedirectToLogin, "{path}");
        }
    }

    #[test]
    fn test_public_routes_proceed_without_user() {
        for path in ["/login", "/register", "/api/register", "/api/images/a.png", "/health", "/static/app.css"] {
            assert_eq!(classify(path, None), GateDecision::Proceed, "{path}");
        }
    }

    #[test]
    fn test_non_admin_sent_to_root_from_admin_routes() {
        let guest = user(Role::User);
        assert_eq!(classify("/dashboard", Some(&guest)), GateDecision::RedirectToRoot);
        assert_eq!(classify("/api/admin/upload", Some(&guest)), GateDecision::RedirectToRoot);
        assert_eq!(classify("/", Some(&guest)), GateDecision::Proceed);
    }

    #[test]
    fn test_admin_proceeds_everywhere() {
        let admin = user(Role::Admin);
        for path in ["/", "/dashboard", "/dashboard/products", "/api/admin/upload"] {
            assert_eq!(classify(path, Some(&admin)), GateDecision::Proceed, "{path}");
        }
    }

    #[test]
    fn test_prefix_matching_is_segment_aware() {
        assert_eq!(scope_of("/dashboardx"), RouteScope::Public);
        assert_eq!(scope_of("/api/administrator"), RouteScope::Public);
        assert_eq!(scope_of("/dashboard/"), RouteScope::Admin);
    }
}
