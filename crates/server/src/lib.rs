//! Gift registry server library.
//!
//! Guests browse a list of wanted products and gift units of them; the admin
//! curates the list from a dashboard. The crate is a library so the core
//! services can be tested and reused outside the HTTP server.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    routing::get,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, service::SignedCookie};
use tower_sessions_sqlx_store::PostgresStore;

use state::AppState;

/// Build the full application router.
///
/// The session layer wraps the access gate, which needs the session to
/// classify each request.
pub fn app(
    state: AppState,
    session_layer: SessionManagerLayer<PostgresStore, SignedCookie>,
    static_dir: &str,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(state.config()))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn(middleware::access_gate_middleware))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use gift_registry_core::Email;

    use super::*;
    use crate::config::{MediaConfig, ServerConfig};
    use crate::db::InMemoryRegistryStore;
    use crate::media::DiskMediaStore;

    /// Router over in-memory stores. The pool is lazy and never connects;
    /// requests without a session cookie do not touch the session store.
    fn test_app(media_root: &std::path::Path) -> Router {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/registry_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("Zt8&Lq3!Vn6#Rb1@Hw5*Km9^Pd2%Gx7$"),
            admin_email: Email::parse("owner@registry.test").unwrap(),
            media: MediaConfig {
                root: media_root.to_path_buf(),
                ..MediaConfig::default()
            },
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/registry_test")
            .unwrap();
        let session_layer = middleware::create_session_layer(&pool, &config).unwrap();
        let state = AppState::with_stores(
            config,
            pool,
            Arc::new(InMemoryRegistryStore::new()),
            Arc::new(DiskMediaStore::new(media_root)),
        );
        app(state, session_layer, "static")
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(test_app(dir.path()), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_anonymous_requests_redirect_to_login() {
        let dir = tempfile::tempdir().unwrap();
        for uri in ["/", "/dashboard", "/dashboard/products/1/edit"] {
            let response = get(test_app(dir.path()), uri).await;
            assert!(response.status().is_redirection(), "{uri}");
            assert_eq!(response.headers()[header::LOCATION], "/login", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_login_page_renders() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(test_app(dir.path()), "/login?error=credentials").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[tokio::test]
    async fn test_missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = get(test_app(dir.path()), "/api/images/0f0f0f.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(test_app(dir.path()), "/api/images/..hidden").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
