//! Gift and cancel-gift form actions.
//!
//! Both actions redirect back to the gift list with a notice describing the
//! outcome.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::{error, instrument};

use gift_registry_core::ProductId;

use super::Notice;
use crate::error::add_breadcrumb;
use crate::middleware::RequireAuth;
use crate::services::{Caller, ErrorKind, RegistryError};
use crate::state::AppState;

/// Gift one unit of a product.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn gift(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Redirect {
    let caller = Caller::from(&user);
    let notice = match state.gifts().gift(Some(&caller), product_id).await {
        Ok(product) => {
            let id = product.id.to_string();
            add_breadcrumb("gift", "Gifted product", Some(&[("product_id", id.as_str())]));
            Notice::success(format!("Thank you for gifting {}!", product.name))
        }
        Err(e) => failure_notice(&e),
    };
    notice.redirect_to("/")
}

/// Withdraw the caller's gift for a product.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Redirect {
    let caller = Caller::from(&user);
    let notice = match state.gifts().cancel_gift(Some(&caller), product_id).await {
        Ok(product) => {
            let id = product.id.to_string();
            add_breadcrumb("gift", "Cancelled gift", Some(&[("product_id", id.as_str())]));
            Notice::success(format!("Your gift of {} was cancelled.", product.name))
        }
        Err(e) => failure_notice(&e),
    };
    notice.redirect_to("/")
}

fn failure_notice(err: &RegistryError) -> Notice {
    if err.kind() == ErrorKind::Internal {
        let event_id = sentry::capture_error(err);
        error!(error = %err, sentry_event_id = %event_id, "Gift action failed");
    }
    Notice::error(err.message())
}
