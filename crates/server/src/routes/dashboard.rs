//! Admin dashboard: product list and product management forms.
//!
//! Create and edit forms are `multipart/form-data` so an image can be chosen
//! in the same submission. A newly uploaded image is stored before the
//! product is written; if the write is refused, the new blob is deleted again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{instrument, warn};

use gift_registry_core::{BlobKey, ProductDraft, ProductField, ProductId};

use super::Notice;
use super::media::{next_field, read_limited, save_image};
use crate::cache::View;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, Product};
use crate::services::{Caller, ErrorKind, RegistryError};
use crate::state::AppState;

/// Multipart field carrying a newly chosen image.
pub const IMAGE_FIELD: &str = "image";

/// One row of the admin product table.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub image_url: String,
    pub desired: i32,
    pub current: i32,
    pub percent: u8,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            image_url: super::image_url(&product.image_key),
            desired: product.quantity.desired(),
            current: product.quantity.current(),
            percent: product.quantity.progress_percent(),
            created_at: product.created_at,
        }
    }
}

/// Values shown in a product form, with the error that sent it back.
#[derive(Debug, Clone, Default)]
pub struct ProductFormView {
    pub name: String,
    pub description: String,
    pub desired_quantity: String,
    pub image_key: String,
    pub error_field: Option<ProductField>,
    pub error: Option<String>,
}

impl ProductFormView {
    fn from_draft(draft: &ProductDraft) -> Self {
        Self {
            name: draft.name.clone(),
            description: draft.description.clone().unwrap_or_default(),
            desired_quantity: draft.desired_quantity.clone(),
            image_key: draft.image_key.clone(),
            ..Self::default()
        }
    }

    fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            desired_quantity: product.quantity.desired().to_string(),
            image_key: product.image_key.to_string(),
            ..Self::default()
        }
    }

    fn with_error(mut self, field: Option<ProductField>, message: String) -> Self {
        self.error_field = field;
        self.error = Some(message);
        self
    }

    /// Whether the error belongs to the named field (`name`, `image_key`, ...).
    #[must_use]
    pub fn has_error(&self, field: &str) -> bool {
        self.error_field.is_some_and(|f| f.as_str() == field)
    }

    /// Image preview URL, when the form refers to a stored image.
    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        BlobKey::parse(&self.image_key)
            .ok()
            .map(|key| super::image_url(&key))
    }
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub user: CurrentUser,
    pub products: Vec<ProductRow>,
    pub form: ProductFormView,
    pub notice: Option<Notice>,
}

/// Product edit page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/edit.html")]
pub struct EditTemplate {
    pub user: CurrentUser,
    pub product_id: ProductId,
    pub form: ProductFormView,
}

/// Query parameters of the dashboard.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub notice: Option<String>,
    pub status: Option<String>,
}

/// A submitted product form.
struct ProductForm {
    draft: ProductDraft,
    /// Key of an image uploaded with this submission.
    uploaded: Option<BlobKey>,
}

/// Read a product form, storing any newly chosen image.
async fn read_product_form(state: &AppState, mut multipart: Multipart) -> Result<ProductForm> {
    let max = state.config().media.max_upload_bytes;
    let mut draft = ProductDraft::default();
    let mut upload = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_owned();
        if name == IMAGE_FIELD {
            let file_name = field.file_name().map(str::to_owned);
            let bytes = read_limited(field, max).await?;
            // Browsers send an empty part when no file was chosen.
            if !bytes.is_empty() {
                upload = Some((file_name, bytes));
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid form field {name}: {e}")))?;
        match name.as_str() {
            "name" => draft.name = value,
            "description" => draft.description = Some(value),
            "desired_quantity" => draft.desired_quantity = value,
            "image_key" => draft.image_key = value,
            _ => {}
        }
    }

    let uploaded = match upload {
        Some((file_name, bytes)) => {
            let key = save_image(state, file_name.as_deref(), bytes).await?;
            draft.image_key = key.to_string();
            Some(key)
        }
        None => None,
    };

    Ok(ProductForm { draft, uploaded })
}

/// Delete an image uploaded with a submission that was refused.
async fn discard_upload(state: &AppState, uploaded: Option<&BlobKey>) {
    if let Some(key) = uploaded
        && let Err(e) = state.media().delete(key).await
    {
        warn!(image_key = %key, error = %e, "Failed to delete unused upload");
    }
}

/// Split a service error into a form message, or an error response.
fn form_error(err: RegistryError) -> Result<(Option<ProductField>, String)> {
    match err {
        RegistryError::Validation { field, message } => Ok((Some(field), message)),
        other => Err(other.into()),
    }
}

async fn render_dashboard(
    state: &AppState,
    user: CurrentUser,
    form: ProductFormView,
    notice: Option<Notice>,
) -> Result<DashboardTemplate> {
    let products = state
        .views()
        .products(View::AdminDashboard, state.store())
        .await?;

    Ok(DashboardTemplate {
        user,
        products: products.iter().map(ProductRow::from).collect(),
        form,
        notice,
    })
}

/// Display the product table and the create form.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse> {
    let notice = Notice::from_query(query.notice, query.status.as_deref());
    render_dashboard(&state, user, ProductFormView::default(), notice).await
}

/// Create a product.
#[instrument(skip(state, user, multipart), fields(admin_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_product_form(&state, multipart).await?;

    match state.products().create(&form.draft).await {
        Ok(product) => Ok(Notice::success(format!("Added {}.", product.name))
            .redirect_to("/dashboard")
            .into_response()),
        Err(e) => {
            discard_upload(&state, form.uploaded.as_ref()).await;
            let (field, message) = form_error(e)?;
            // The discarded upload must not be offered back to the form.
            let mut view = ProductFormView::from_draft(&form.draft);
            if form.uploaded.is_some() {
                view.image_key.clear();
            }
            let page =
                render_dashboard(&state, user, view.with_error(field, message), None).await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Display the edit form of a product.
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(product_id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let caller = Caller::from(&user);
    let product = state.products().find(Some(&caller), product_id).await?;

    Ok(EditTemplate {
        user,
        product_id,
        form: ProductFormView::from_product(&product),
    })
}

/// Update a product.
#[instrument(skip(state, user, multipart), fields(admin_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(product_id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_product_form(&state, multipart).await?;
    let caller = Caller::from(&user);

    match state
        .products()
        .update(Some(&caller), product_id, &form.draft)
        .await
    {
        Ok(product) => Ok(Notice::success(format!("Updated {}.", product.name))
            .redirect_to("/dashboard")
            .into_response()),
        Err(e) => {
            discard_upload(&state, form.uploaded.as_ref()).await;
            let (field, message) = form_error(e)?;
            // Fall back to the stored image when the new upload was discarded.
            let mut view = ProductFormView::from_draft(&form.draft);
            if form.uploaded.is_some() {
                view.image_key = state
                    .store()
                    .get_product(product_id)
                    .await?
                    .map(|p| p.image_key.to_string())
                    .unwrap_or_default();
            }
            let page = EditTemplate {
                user,
                product_id,
                form: view.with_error(field, message),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Delete a product with its gifts and image.
#[instrument(skip(state, user), fields(admin_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(product_id): Path<ProductId>,
) -> Result<Redirect> {
    let caller = Caller::from(&user);
    let notice = match state.products().delete(Some(&caller), product_id).await {
        Ok(product) => Notice::success(format!("Deleted {}.", product.name)),
        Err(e) if e.kind() == ErrorKind::NotFound => Notice::error(e.message()),
        Err(e) => return Err(e.into()),
    };
    Ok(notice.redirect_to("/dashboard"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_view_error_matches_field() {
        let view = ProductFormView::default().with_error(
            Some(ProductField::DesiredQuantity),
            "quantity must be a whole number greater than zero".to_string(),
        );
        assert!(view.has_error("desired_quantity"));
        assert!(!view.has_error("name"));
    }

    #[test]
    fn test_form_view_image_url_needs_valid_key() {
        let mut view = ProductFormView::default();
        assert_eq!(view.image_url(), None);

        view.image_key = "c0ffee.jpg".to_string();
        assert_eq!(view.image_url().as_deref(), Some("/api/images/c0ffee.jpg"));

        view.image_key = "../etc/passwd".to_string();
        assert_eq!(view.image_url(), None);
    }

    #[test]
    fn test_non_validation_errors_become_responses() {
        assert!(form_error(RegistryError::AlreadyFulfilled).is_err());
        let (field, message) = form_error(RegistryError::Validation {
            field: ProductField::Name,
            message: "name must be at least 3 characters".to_string(),
        })
        .unwrap();
        assert_eq!(field, Some(ProductField::Name));
        assert_eq!(message, "name must be at least 3 characters");
    }
}
