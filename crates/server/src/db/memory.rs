//! In-process [`RegistryStore`].
//!
//! All state sits behind one async mutex, so every operation runs as if it
//! were a serializable transaction. Used by tests and local demos that run
//! without `PostgreSQL`.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use gift_registry_core::{GiftId, ProductId, Quantity, QuantityError, UserId, ValidProduct};

use super::{CancelOutcome, GiftOutcome, RegistryStore, RepositoryError, UpdateOutcome};
use crate::models::{Gift, Product};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    gifts: Vec<Gift>,
    next_product_id: i32,
    next_gift_id: i32,
}

impl State {
    fn next_product_id(&mut self) -> ProductId {
        self.next_product_id += 1;
        ProductId::new(self.next_product_id)
    }

    fn next_gift_id(&mut self) -> GiftId {
        self.next_gift_id += 1;
        GiftId::new(self.next_gift_id)
    }
}

/// [`RegistryStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl InMemoryRegistryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// All gift rows, oldest first.
    pub async fn gifts(&self) -> Vec<Gift> {
        self.state.lock().await.gifts.clone()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.check_available()?;
        let state = self.state.lock().await;
        // Newest first; IDs break ties between products created in the same instant.
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.check_available()?;
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn gifted_product_ids(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<ProductId>, RepositoryError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .gifts
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.product_id)
            .collect())
    }

    async fn count_gifts(&self, product_id: ProductId) -> Result<i64, RepositoryError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let count = state
            .gifts
            .iter()
            .filter(|g| g.product_id == product_id)
            .count();
        i64::try_from(count).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
    }

    async fn gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<GiftOutcome, RepositoryError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let Some(product) = state.products.get(&product_id) else {
            return Ok(GiftOutcome::ProductNotFound);
        };
        let quantity = match product.quantity.gifted() {
            Ok(q) => q,
            Err(QuantityError::Fulfilled) => return Ok(GiftOutcome::Fulfilled),
            Err(e) => return Err(RepositoryError::DataCorruption(e.to_string())),
        };

        let gift = Gift {
            id: state.next_gift_id(),
            user_id,
            product_id,
            created_at: Utc::now(),
        };
        state.gifts.push(gift);

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(RepositoryError::NotFound)?;
        product.quantity = quantity;
        Ok(GiftOutcome::Gifted(product.clone()))
    }

    async fn cancel_gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<CancelOutcome, RepositoryError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let Some(product) = state.products.get(&product_id) else {
            return Ok(CancelOutcome::NoGift);
        };
        // Gifts are appended in creation order, so the first match is the oldest.
        let Some(position) = state
            .gifts
            .iter()
            .position(|g| g.product_id == product_id && g.user_id == user_id)
        else {
            return Ok(CancelOutcome::NoGift);
        };
        let quantity = product
            .quantity
            .cancelled()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        state.gifts.remove(position);
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(RepositoryError::NotFound)?;
        product.quantity = quantity;
        Ok(CancelOutcome::Cancelled(product.clone()))
    }

    async fn create_product(&self, fields: &ValidProduct) -> Result<Product, RepositoryError> {
        self.check_available()?;
        let quantity = Quantity::fresh(fields.desired_quantity)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let mut state = self.state.lock().await;
        let id = state.next_product_id();
        // Keep creation times strictly increasing so "newest first" is stable.
        let created_at = state
            .products
            .values()
            .map(|p| p.created_at)
            .max()
            .map_or_else(Utc::now, |latest| {
                Utc::now().max(latest + Duration::microseconds(1))
            });

        let product = Product {
            id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            image_key: fields.image_key.clone(),
            quantity,
            created_at,
        };
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        fields: &ValidProduct,
    ) -> Result<UpdateOutcome, RepositoryError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let Some(product) = state.products.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        let quantity = match product.quantity.with_desired(fields.desired_quantity) {
            Ok(q) => q,
            Err(QuantityError::BelowGifted { gifted }) => {
                return Ok(UpdateOutcome::BelowGifted { gifted });
            }
            Err(e) => return Err(RepositoryError::DataCorruption(e.to_string())),
        };

        let previous_image_key = product.image_key.clone();
        product.name.clone_from(&fields.name);
        product.description.clone_from(&fields.description);
        product.image_key = fields.image_key.clone();
        product.quantity = quantity;

        Ok(UpdateOutcome::Updated {
            product: product.clone(),
            previous_image_key,
        })
    }

    async fn delete_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let removed = state.products.remove(&id);
        if removed.is_some() {
            state.gifts.retain(|g| g.product_id != id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gift_registry_core::ProductDraft;

    use super::*;

    fn fields(name: &str, quantity: i32) -> ValidProduct {
        ProductDraft::new(name, "photo.png", quantity).validate().unwrap()
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = InMemoryRegistryStore::new();
        let first = store.create_product(&fields("Kettle", 1)).await.unwrap();
        let second = store.create_product(&fields("Toaster", 1)).await.unwrap();

        let listed: Vec<ProductId> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_gift_and_cancel_keep_rows_in_step() {
        let store = InMemoryRegistryStore::new();
        let product = store.create_product(&fields("Kettle", 2)).await.unwrap();
        let user = UserId::new(1);

        let GiftOutcome::Gifted(after) = store.gift(product.id, user).await.unwrap() else {
            panic!("expected gift to succeed");
        };
        assert_eq!(after.quantity.current(), 1);
        assert_eq!(store.count_gifts(product.id).await.unwrap(), 1);
        assert!(store.gifted_product_ids(user).await.unwrap().contains(&product.id));

        let CancelOutcome::Cancelled(after) = store.cancel_gift(product.id, user).await.unwrap()
        else {
            panic!("expected cancel to succeed");
        };
        assert_eq!(after.quantity.current(), 0);
        assert_eq!(store.count_gifts(product.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_removes_oldest_gift() {
        let store = InMemoryRegistryStore::new();
        let product = store.create_product(&fields("Kettle", 3)).await.unwrap();
        let user = UserId::new(1);

        store.gift(product.id, user).await.unwrap();
        store.gift(product.id, user).await.unwrap();
        let oldest = store.gifts().await[0].id;

        store.cancel_gift(product.id, user).await.unwrap();
        let remaining = store.gifts().await;
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id, oldest);
    }

    #[tokio::test]
    async fn test_update_below_gifted_refused() {
        let store = InMemoryRegistryStore::new();
        let product = store.create_product(&fields("Kettle", 3)).await.unwrap();
        store.gift(product.id, UserId::new(1)).await.unwrap();
        store.gift(product.id, UserId::new(2)).await.unwrap();

        let outcome = store
            .update_product(product.id, &fields("Kettle", 1))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::BelowGifted { gifted: 2 });
        let unchanged = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.quantity.desired(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_without_mutation() {
        let store = InMemoryRegistryStore::new();
        let product = store.create_product(&fields("Kettle", 1)).await.unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            store.gift(product.id, UserId::new(1)).await,
            Err(RepositoryError::Database(_))
        ));

        store.set_unavailable(false);
        assert_eq!(store.count_gifts(product.id).await.unwrap(), 0);
    }
}
