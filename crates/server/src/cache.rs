//! Cached product listings and their invalidation signal.
//!
//! The public listing and the admin dashboard each keep a cached product list
//! (5-minute TTL). Services call [`CacheInvalidator::invalidate`] after every
//! committed mutation so the next request recomputes the stale views.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::db::{RegistryStore, RepositoryError};
use crate::models::Product;

/// A rendered view whose data can go stale.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum View {
    /// The gift list at `/`.
    PublicListing,
    /// The admin product table at `/dashboard`.
    AdminDashboard,
}

impl View {
    /// Every view that shows product data.
    pub const ALL: [Self; 2] = [Self::PublicListing, Self::AdminDashboard];
}

/// Receiver of the "these views are stale" signal.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, views: &[View]);
}

/// Per-view cache of the product list.
#[derive(Clone)]
pub struct ViewCache {
    inner: Arc<ViewCacheInner>,
}

/// A cached listing with the view generation it was loaded under.
#[derive(Clone)]
struct Entry {
    generation: u64,
    products: Arc<Vec<Product>>,
}

struct ViewCacheInner {
    cache: Cache<View, Entry>,
    /// Bumped on every invalidation of the view. An entry whose generation is
    /// behind is stale, even when its insert landed after the invalidation.
    public_generation: AtomicU64,
    admin_generation: AtomicU64,
}

impl ViewCacheInner {
    const fn generation(&self, view: View) -> &AtomicU64 {
        match view {
            View::PublicListing => &self.public_generation,
            View::AdminDashboard => &self.admin_generation,
        }
    }

    fn current(&self, view: View) -> u64 {
        self.generation(view).load(Ordering::SeqCst)
    }

    async fn fresh(&self, view: View) -> Option<Arc<Vec<Product>>> {
        self.cache
            .get(&view)
            .await
            .filter(|entry| entry.generation == self.current(view))
            .map(|entry| entry.products)
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(ViewCacheInner {
                cache,
                public_generation: AtomicU64::new(0),
                admin_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Products for a view, loading from the store on a miss.
    ///
    /// # Errors
    ///
    /// Returns the store error when a miss cannot be filled.
    pub async fn products(
        &self,
        view: View,
        store: &dyn RegistryStore,
    ) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(products) = self.inner.fresh(view).await {
            debug!(?view, "Cache hit for product listing");
            return Ok(products);
        }

        let generation = self.inner.current(view);
        let products = Arc::new(store.list_products().await?);
        self.fill(view, generation, Arc::clone(&products)).await;

        Ok(products)
    }

    /// Cache a listing loaded while the view was at `generation`.
    async fn fill(&self, view: View, generation: u64, products: Arc<Vec<Product>>) {
        self.inner
            .cache
            .insert(
                view,
                Entry {
                    generation,
                    products,
                },
            )
            .await;
    }

    /// Whether a view currently has an up-to-date cached listing.
    pub async fn is_cached(&self, view: View) -> bool {
        self.inner.fresh(view).await.is_some()
    }
}

#[async_trait]
impl CacheInvalidator for ViewCache {
    async fn invalidate(&self, views: &[View]) {
        for view in views {
            self.inner.generation(*view).fetch_add(1, Ordering::SeqCst);
            self.inner.cache.invalidate(view).await;
        }
        debug!(?views, "Invalidated cached views");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gift_registry_core::ProductDraft;

    use super::*;
    use crate::db::InMemoryRegistryStore;

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = InMemoryRegistryStore::new();
        let cache = ViewCache::new();

        assert!(cache.products(View::PublicListing, &store).await.unwrap().is_empty());
        assert!(cache.is_cached(View::PublicListing).await);

        let draft = ProductDraft::new("Blender", "blender.png", 1);
        store.create_product(&draft.validate().unwrap()).await.unwrap();

        // Still the cached (empty) list until invalidated.
        assert!(cache.products(View::PublicListing, &store).await.unwrap().is_empty());

        cache.invalidate(&[View::PublicListing]).await;
        assert_eq!(cache.products(View::PublicListing, &store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_only_named_views() {
        let store = InMemoryRegistryStore::new();
        let cache = ViewCache::new();

        cache.products(View::PublicListing, &store).await.unwrap();
        cache.products(View::AdminDashboard, &store).await.unwrap();

        cache.invalidate(&[View::AdminDashboard]).await;
        assert!(cache.is_cached(View::PublicListing).await);
        assert!(!cache.is_cached(View::AdminDashboard).await);
    }

    #[tokio::test]
    async fn test_listing_stored_after_invalidation_is_not_served() {
        let store = InMemoryRegistryStore::new();
        let cache = ViewCache::new();

        // A load reads the empty store, then a product commits and invalidates
        // before the load gets to store its result.
        let generation = cache.inner.current(View::PublicListing);
        let stale = Arc::new(store.list_products().await.unwrap());

        let draft = ProductDraft::new("Blender", "blender.png", 1);
        store.create_product(&draft.validate().unwrap()).await.unwrap();
        cache.invalidate(&View::ALL).await;

        cache.fill(View::PublicListing, generation, stale).await;

        assert!(!cache.is_cached(View::PublicListing).await);
        let products = cache.products(View::PublicListing, &store).await.unwrap();
        assert_eq!(products.len(), 1);
        assert!(cache.is_cached(View::PublicListing).await);
    }
}
