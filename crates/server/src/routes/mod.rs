//! HTTP route handlers for the registry.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                  - Gift list (?search=, ?notice=)
//! POST /gifts/{product_id}                - Gift one unit
//! POST /gifts/{product_id}/cancel         - Cancel the caller's gift
//!
//! # Auth
//! GET  /login                             - Login page
//! POST /login                             - Login action
//! GET  /register                          - Register page
//! POST /register                          - Register action
//! POST /logout                            - Logout action
//! POST /api/register                      - JSON registration
//!
//! # Media
//! GET  /api/images/{key}                  - Serve an uploaded image
//! POST /api/admin/upload                  - Upload an image (admin)
//!
//! # Dashboard (admin)
//! GET  /dashboard                         - Product table + create form
//! POST /dashboard/products                - Create product
//! GET  /dashboard/products/{id}/edit      - Edit form
//! POST /dashboard/products/{id}           - Update product
//! POST /dashboard/products/{id}/delete    - Delete product
//! ```

pub mod auth;
pub mod dashboard;
pub mod gifts;
pub mod home;
pub mod media;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
};

use gift_registry_core::BlobKey;

use crate::config::{MediaConfig, ServerConfig};
use crate::middleware::{auth_rate_limiter, upload_rate_limiter};
use crate::state::AppState;

/// Room for the non-file multipart fields on top of the image itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// URL an image is served from.
#[must_use]
pub fn image_url(key: &BlobKey) -> String {
    format!("/api/images/{key}")
}

/// One-shot message shown after a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub is_error: bool,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }

    /// Rebuild a notice from `?notice=` and `?status=`.
    #[must_use]
    pub fn from_query(notice: Option<String>, status: Option<&str>) -> Option<Self> {
        let message = notice.filter(|m| !m.trim().is_empty())?;
        Some(Self {
            message,
            is_error: status == Some("error"),
        })
    }

    /// Redirect to `path`, carrying this notice in the query string.
    #[must_use]
    pub fn redirect_to(&self, path: &str) -> Redirect {
        let status = if self.is_error { "error" } else { "ok" };
        Redirect::to(&format!(
            "{path}?notice={}&status={status}",
            urlencoding::encode(&self.message)
        ))
    }
}

/// Create the auth routes router.
///
/// Only the form and API submissions are rate limited.
pub fn auth_routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page)
                .merge(post(auth::login).layer(auth_rate_limiter(trust_proxy))),
        )
        .route(
            "/register",
            get(auth::register_page)
                .merge(post(auth::register).layer(auth_rate_limiter(trust_proxy))),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/api/register",
            post(auth::api_register).layer(auth_rate_limiter(trust_proxy)),
        )
}

/// Create the gift action routes router.
pub fn gift_routes() -> Router<AppState> {
    Router::new()
        .route("/{product_id}", post(gifts::gift))
        .route("/{product_id}/cancel", post(gifts::cancel))
}

/// Create the dashboard routes router.
pub fn dashboard_routes(media: &MediaConfig) -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/products", post(dashboard::create))
        .route("/products/{id}", post(dashboard::update))
        .route("/products/{id}/edit", get(dashboard::edit))
        .route("/products/{id}/delete", post(dashboard::delete))
        .layer(DefaultBodyLimit::max(
            media.max_upload_bytes + FORM_OVERHEAD_BYTES,
        ))
}

/// Create the media routes router.
pub fn media_routes(media: &MediaConfig, trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route("/api/images/{key}", get(media::show))
        .route(
            "/api/admin/upload",
            post(media::upload)
                .layer::<_, std::convert::Infallible>(upload_rate_limiter(trust_proxy))
                .layer(DefaultBodyLimit::max(
                    media.max_upload_bytes + FORM_OVERHEAD_BYTES,
                )),
        )
}

/// Create all routes for the registry.
pub fn routes(config: &ServerConfig) -> Router<AppState> {
    let trust_proxy = config.trust_proxy_headers;
    Router::new()
        .route("/", get(home::home))
        .nest("/gifts", gift_routes())
        .nest("/dashboard", dashboard_routes(&config.media))
        .merge(auth_routes(trust_proxy))
        .merge(media_routes(&config.media, trust_proxy))
}
