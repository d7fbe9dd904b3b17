//! Gift transaction service.

use std::sync::Arc;

use tracing::{info, instrument};

use gift_registry_core::ProductId;

use super::{Caller, RegistryError};
use crate::cache::{CacheInvalidator, View};
use crate::db::{CancelOutcome, GiftOutcome, RegistryStore};
use crate::models::Product;

/// Gifts and cancels units of registry products.
///
/// Both operations are a single store transaction; the cache is invalidated
/// only after that transaction commits.
#[derive(Clone)]
pub struct GiftService {
    store: Arc<dyn RegistryStore>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl GiftService {
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self { store, invalidator }
    }

    /// Gift one unit of a product.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound` if the product doesn't exist
    /// - `AlreadyFulfilled` if nothing remains to gift
    /// - `Internal` if the store transaction fails
    #[instrument(skip(self, caller), fields(user_id = tracing::field::Empty))]
    pub async fn gift(
        &self,
        caller: Option<&Caller>,
        product_id: ProductId,
    ) -> Result<Product, RegistryError> {
        let caller = caller.ok_or_else(|| {
            RegistryError::Unauthenticated("you must be signed in to give a gift".to_owned())
        })?;
        tracing::Span::current().record("user_id", caller.user_id.as_i32());

        match self.store.gift(product_id, caller.user_id).await? {
            GiftOutcome::Gifted(product) => {
                self.invalidator.invalidate(&View::ALL).await;
                info!(
                    current = product.quantity.current(),
                    desired = product.quantity.desired(),
                    "Gift recorded"
                );
                Ok(product)
            }
            GiftOutcome::ProductNotFound => {
                Err(RegistryError::NotFound("product not found".to_owned()))
            }
            GiftOutcome::Fulfilled => Err(RegistryError::AlreadyFulfilled),
        }
    }

    /// Cancel the caller's gift for a product.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound` if the caller holds no gift for the product
    /// - `Internal` if the store transaction fails
    #[instrument(skip(self, caller), fields(user_id = tracing::field::Empty))]
    pub async fn cancel_gift(
        &self,
        caller: Option<&Caller>,
        product_id: ProductId,
    ) -> Result<Product, RegistryError> {
        let caller = caller.ok_or_else(|| {
            RegistryError::Unauthenticated("you must be signed in to cancel a gift".to_owned())
        })?;
        tracing::Span::current().record("user_id", caller.user_id.as_i32());

        match self.store.cancel_gift(product_id, caller.user_id).await? {
            CancelOutcome::Cancelled(product) => {
                self.invalidator.invalidate(&View::ALL).await;
                info!(
                    current = product.quantity.current(),
                    desired = product.quantity.desired(),
                    "Gift cancelled"
                );
                Ok(product)
            }
            CancelOutcome::NoGift => Err(RegistryError::NotFound(
                "no gift by this user for this product".to_owned(),
            )),
        }
    }
}
