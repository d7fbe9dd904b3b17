//! Integration tests for the gift registry.
//!
//! # Running Tests
//!
//! ```bash
//! # Service-level tests (no database needed)
//! cargo test -p gift-registry-integration-tests
//!
//! # Include the PostgreSQL tests
//! REGISTRY_TEST_DATABASE_URL=postgres://localhost/registry_test \
//!     cargo test -p gift-registry-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `gift_transactions` - Gift / cancel-gift transitions and concurrency
//! - `product_lifecycle` - Create / update / delete with media cleanup
//! - `postgres_store` - The same properties against a real database
//!
//! This library holds the shared fixtures: a media store and a cache
//! invalidator that record every call, wired to the real services over the
//! in-memory registry store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use gift_registry_core::{BlobKey, ProductDraft, Role, UserId};
use gift_registry_server::cache::{CacheInvalidator, View};
use gift_registry_server::db::{InMemoryRegistryStore, RegistryStore};
use gift_registry_server::media::{Blob, MediaError, MediaStore};
use gift_registry_server::models::Product;
use gift_registry_server::services::{Caller, GiftService, ProductService};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Recording Media Store
// =============================================================================

/// In-memory [`MediaStore`] that records every delete attempt.
#[derive(Debug, Default)]
pub struct RecordingMediaStore {
    blobs: Mutex<HashMap<BlobKey, Vec<u8>>>,
    deletes: Mutex<Vec<BlobKey>>,
    fail_deletes: AtomicBool,
}

impl RecordingMediaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delete fail (after being recorded).
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Every key a delete was attempted for, in order.
    #[must_use]
    pub fn delete_attempts(&self) -> Vec<BlobKey> {
        lock(&self.deletes).clone()
    }

    /// Whether a blob is currently stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &BlobKey) -> bool {
        lock(&self.blobs).contains_key(key)
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn put(&self, key: &BlobKey, bytes: Vec<u8>) -> Result<(), MediaError> {
        lock(&self.blobs).insert(key.clone(), bytes);
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Option<Blob>, MediaError> {
        Ok(lock(&self.blobs).get(key).map(|bytes| Blob {
            bytes: bytes.clone(),
            content_type: key.content_type(),
        }))
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), MediaError> {
        lock(&self.deletes).push(key.clone());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MediaError::Io {
                key: key.to_string(),
                source: std::io::Error::other("media backend unavailable"),
            });
        }
        lock(&self.blobs).remove(key);
        Ok(())
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, MediaError> {
        Ok(self.contains(key))
    }
}

// =============================================================================
// Recording Invalidator
// =============================================================================

/// [`CacheInvalidator`] that records each signal.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    signals: Mutex<Vec<Vec<View>>>,
}

impl RecordingInvalidator {
    /// Number of invalidation signals received.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.signals).len()
    }

    /// Views named by the most recent signal.
    #[must_use]
    pub fn last(&self) -> Option<HashSet<View>> {
        lock(&self.signals)
            .last()
            .map(|views| views.iter().copied().collect())
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, views: &[View]) {
        lock(&self.signals).push(views.to_vec());
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Services wired to recording collaborators.
pub struct Harness {
    pub store: Arc<InMemoryRegistryStore>,
    pub media: Arc<RecordingMediaStore>,
    pub invalidator: Arc<RecordingInvalidator>,
    pub gifts: GiftService,
    pub products: ProductService,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRegistryStore::new());
        let media = Arc::new(RecordingMediaStore::new());
        let invalidator = Arc::new(RecordingInvalidator::default());

        let gifts = GiftService::new(store.clone(), invalidator.clone());
        let products = ProductService::new(store.clone(), media.clone(), invalidator.clone());

        Self {
            store,
            media,
            invalidator,
            gifts,
            products,
        }
    }

    /// Store a blob as the upload endpoint would, returning its key.
    ///
    /// # Panics
    ///
    /// Panics if the recording store refuses the blob, which it never does.
    pub async fn upload(&self, file_name: &str) -> BlobKey {
        let key = BlobKey::generate(Some(file_name));
        self.media
            .put(&key, b"image bytes".to_vec())
            .await
            .expect("recording media store accepts every put");
        key
    }

    /// Create a product with a freshly uploaded image.
    ///
    /// # Panics
    ///
    /// Panics if the product is refused; fixtures always use valid fields.
    pub async fn product(&self, name: &str, desired_quantity: i32) -> Product {
        let key = self.upload("photo.jpg").await;
        self.products
            .create(&ProductDraft::new(name, key.as_str(), desired_quantity))
            .await
            .expect("fixture product is valid")
    }

    /// Current state of a product straight from the store.
    ///
    /// # Panics
    ///
    /// Panics if the store is unavailable or the product is gone.
    pub async fn reload(&self, product: &Product) -> Product {
        self.store
            .get_product(product.id)
            .await
            .expect("store available")
            .expect("product exists")
    }
}

/// A signed-in guest.
#[must_use]
pub const fn guest(id: i32) -> Caller {
    Caller::new(UserId::new(id), Role::User)
}

/// The registry admin.
#[must_use]
pub const fn admin() -> Caller {
    Caller::new(UserId::new(1000), Role::Admin)
}
