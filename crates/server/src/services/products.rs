//! Product lifecycle service.
//!
//! Create, update and delete products, keeping the media store in step. The
//! database row is the source of truth: once it has committed, a failure to
//! delete a replaced or orphaned image is logged and the operation still
//! succeeds.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use gift_registry_core::{BlobKey, ProductDraft, ProductField, ProductId, ValidProduct};

use super::{Caller, RegistryError};
use crate::cache::{CacheInvalidator, View};
use crate::db::{RegistryStore, UpdateOutcome};
use crate::media::MediaStore;
use crate::models::Product;

/// Admin product management.
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn RegistryStore>,
    media: Arc<dyn MediaStore>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl ProductService {
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistryStore>,
        media: Arc<dyn MediaStore>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            media,
            invalidator,
        }
    }

    /// Create a product with nothing gifted yet.
    ///
    /// Carries no role check of its own; the dashboard route that calls it is
    /// admin-only.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is invalid or the image was never uploaded
    /// - `Internal` if the store or the media existence check fails
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RegistryError> {
        let fields = self.validate(draft).await?;

        let product = self.store.create_product(&fields).await?;
        self.invalidator.invalidate(&View::ALL).await;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Load a product for editing.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` / `Forbidden` unless the caller is an admin
    /// - `NotFound` if the product doesn't exist
    pub async fn find(
        &self,
        caller: Option<&Caller>,
        product_id: ProductId,
    ) -> Result<Product, RegistryError> {
        require_admin(caller)?;

        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(product_not_found)
    }

    /// Replace the editable fields of a product.
    ///
    /// When the image key changes, the previous blob is deleted after the row
    /// has committed.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` / `Forbidden` unless the caller is an admin, checked
    ///   before anything else
    /// - `Validation` if a field is invalid, or the desired quantity is below
    ///   the units already gifted
    /// - `NotFound` if the product doesn't exist
    /// - `Internal` if the store transaction fails
    #[instrument(skip(self, caller, draft))]
    pub async fn update(
        &self,
        caller: Option<&Caller>,
        product_id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RegistryError> {
        require_admin(caller)?;
        let fields = self.validate(draft).await?;

        let (product, previous_image_key) =
            match self.store.update_product(product_id, &fields).await? {
                UpdateOutcome::Updated {
                    product,
                    previous_image_key,
                } => (product, previous_image_key),
                UpdateOutcome::NotFound => return Err(product_not_found()),
                UpdateOutcome::BelowGifted { gifted } => {
                    return Err(RegistryError::validation(
                        ProductField::DesiredQuantity,
                        format!("quantity cannot be lower than the {gifted} already gifted"),
                    ));
                }
            };

        if previous_image_key != product.image_key {
            self.discard_image(&previous_image_key).await;
        }
        self.invalidator.invalidate(&View::ALL).await;

        info!("Product updated");
        Ok(product)
    }

    /// Delete a product, its gifts, and (best effort) its image.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` / `Forbidden` unless the caller is an admin, checked
    ///   before the product is looked up
    /// - `NotFound` if the product doesn't exist
    /// - `Internal` if the store transaction fails
    #[instrument(skip(self, caller))]
    pub async fn delete(
        &self,
        caller: Option<&Caller>,
        product_id: ProductId,
    ) -> Result<Product, RegistryError> {
        require_admin(caller)?;

        let product = self
            .store
            .delete_product(product_id)
            .await?
            .ok_or_else(product_not_found)?;

        self.discard_image(&product.image_key).await;
        self.invalidator.invalidate(&View::ALL).await;

        info!("Product deleted");
        Ok(product)
    }

    /// Validate a draft, including that its image exists in the media store.
    async fn validate(&self, draft: &ProductDraft) -> Result<ValidProduct, RegistryError> {
        let fields = draft.validate()?;

        let exists = self.media.exists(&fields.image_key).await.map_err(|e| {
            RegistryError::Internal(format!("media existence check failed: {e}"))
        })?;
        if !exists {
            return Err(RegistryError::validation(
                ProductField::ImageKey,
                "image not found, upload it again",
            ));
        }

        Ok(fields)
    }

    /// Delete a blob whose product row no longer references it.
    ///
    /// Failures leave an orphaned blob behind and are only logged.
    async fn discard_image(&self, key: &BlobKey) {
        if let Err(e) = self.media.delete(key).await {
            warn!(image_key = %key, error = %e, "Failed to delete image, leaving orphaned blob");
        }
    }
}

fn require_admin(caller: Option<&Caller>) -> Result<&Caller, RegistryError> {
    let caller = caller.ok_or_else(|| {
        RegistryError::Unauthenticated("you must be signed in to manage products".to_owned())
    })?;
    if !caller.is_admin() {
        return Err(RegistryError::Forbidden);
    }
    Ok(caller)
}

fn product_not_found() -> RegistryError {
    RegistryError::NotFound("product not found".to_owned())
}
