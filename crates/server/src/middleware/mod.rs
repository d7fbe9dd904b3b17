//! HTTP middleware stack for the registry server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store, signed cookie)
//! 6. Access gate (login / role redirects)
//!
//! Auth submissions and uploads are additionally rate limited per route
//! (governor).

pub mod auth;
pub mod gate;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAdmin, RequireAuth, clear_current_user, set_current_user};
pub use gate::{GateDecision, access_gate_middleware, classify};
pub use rate_limit::{auth_rate_limiter, upload_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
