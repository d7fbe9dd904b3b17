//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::ViewCache;
use crate::config::ServerConfig;
use crate::db::{PgRegistryStore, RegistryStore};
use crate::media::{DiskMediaStore, MediaStore};
use crate::services::{GiftService, ProductService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    store: Arc<dyn RegistryStore>,
    media: Arc<dyn MediaStore>,
    views: ViewCache,
    gifts: GiftService,
    products: ProductService,
}

impl AppState {
    /// Create a new application state backed by `PostgreSQL` and the disk
    /// media store configured in `config`.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let store: Arc<dyn RegistryStore> = Arc::new(PgRegistryStore::new(pool.clone()));
        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(config.media.root.clone()));
        Self::with_stores(config, pool, store, media)
    }

    /// Create application state over explicit store implementations.
    ///
    /// The pool is still needed for accounts and sessions.
    #[must_use]
    pub fn with_stores(
        config: ServerConfig,
        pool: PgPool,
        store: Arc<dyn RegistryStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let views = ViewCache::new();
        let invalidator = Arc::new(views.clone());
        let gifts = GiftService::new(Arc::clone(&store), invalidator.clone());
        let products = ProductService::new(Arc::clone(&store), Arc::clone(&media), invalidator);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                store,
                media,
                views,
                gifts,
                products,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the product/gift store.
    #[must_use]
    pub fn store(&self) -> &dyn RegistryStore {
        self.inner.store.as_ref()
    }

    /// Get the media store.
    #[must_use]
    pub fn media(&self) -> &dyn MediaStore {
        self.inner.media.as_ref()
    }

    /// Get the cached product listings.
    #[must_use]
    pub fn views(&self) -> &ViewCache {
        &self.inner.views
    }

    /// Get the gift transaction service.
    #[must_use]
    pub fn gifts(&self) -> &GiftService {
        &self.inner.gifts
    }

    /// Get the product lifecycle service.
    #[must_use]
    pub fn products(&self) -> &ProductService {
        &self.inner.products
    }
}
