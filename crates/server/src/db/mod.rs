//! Persistent store for the registry.
//!
//! # Database schema: `registry`
//!
//! ## Tables
//!
//! - `user` - Accounts with their argon2 password hash and role
//! - `product` - Registry items with desired and gifted counts
//! - `gift` - One row per gifted unit, cascades with its product and user
//! - `session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p gift-registry-cli -- migrate
//! ```
//!
//! # Store boundary
//!
//! Services talk to [`RegistryStore`], never to the pool directly.
//! [`PgRegistryStore`] is the production implementation;
//! [`InMemoryRegistryStore`] runs the same transitions behind a single lock.

pub mod gifts;
pub mod memory;
pub mod products;
pub mod users;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use gift_registry_core::{BlobKey, ProductId, UserId, ValidProduct};

use crate::models::Product;

pub use gifts::GiftRepository;
pub use memory::InMemoryRegistryStore;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Result of a gift transition that reached the product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftOutcome {
    /// One unit was gifted; carries the product after the increment.
    Gifted(Product),
    /// No product with that ID.
    ProductNotFound,
    /// The product was already fulfilled; nothing changed.
    Fulfilled,
}

/// Result of a cancel transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// One gift was removed; carries the product after the decrement.
    Cancelled(Product),
    /// The caller holds no gift for that product (or the product is gone).
    NoGift,
}

/// Result of a product update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Row updated; carries the image key it had before the update.
    Updated {
        product: Product,
        previous_image_key: BlobKey,
    },
    /// No product with that ID.
    NotFound,
    /// The new desired quantity is lower than the units already gifted.
    BelowGifted { gifted: i32 },
}

/// Transactional store for products and gifts.
///
/// Every mutating method is one atomic transaction: either all of its
/// effects commit or none do. Gift and cancel serialize per product, so
/// `0 <= current_quantity <= desired_quantity` and "gift rows == current
/// quantity" hold at every commit point.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// A single product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products the user currently holds at least one gift for.
    async fn gifted_product_ids(&self, user_id: UserId)
    -> Result<HashSet<ProductId>, RepositoryError>;

    /// Number of gift rows referencing a product.
    async fn count_gifts(&self, product_id: ProductId) -> Result<i64, RepositoryError>;

    /// Gift one unit of a product.
    async fn gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<GiftOutcome, RepositoryError>;

    /// Cancel the user's oldest gift for a product.
    async fn cancel_gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<CancelOutcome, RepositoryError>;

    /// Insert a product with nothing gifted.
    async fn create_product(&self, fields: &ValidProduct) -> Result<Product, RepositoryError>;

    /// Replace the editable fields of a product.
    async fn update_product(
        &self,
        id: ProductId,
        fields: &ValidProduct,
    ) -> Result<UpdateOutcome, RepositoryError>;

    /// Delete a product and, by cascade, its gifts. Returns the deleted row.
    async fn delete_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// [`RegistryStore`] backed by `PostgreSQL`.
///
/// Gift and cancel lock the product row with `SELECT ... FOR UPDATE` before
/// touching gift rows, so both transitions take locks in the same order.
#[derive(Clone)]
pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).list().await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get_by_id(id).await
    }

    async fn gifted_product_ids(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<ProductId>, RepositoryError> {
        GiftRepository::new(&self.pool)
            .product_ids_for_user(user_id)
            .await
    }

    async fn count_gifts(&self, product_id: ProductId) -> Result<i64, RepositoryError> {
        GiftRepository::new(&self.pool)
            .count_for_product(product_id)
            .await
    }

    async fn gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<GiftOutcome, RepositoryError> {
        GiftRepository::new(&self.pool)
            .gift(product_id, user_id)
            .await
    }

    async fn cancel_gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<CancelOutcome, RepositoryError> {
        GiftRepository::new(&self.pool)
            .cancel(product_id, user_id)
            .await
    }

    async fn create_product(&self, fields: &ValidProduct) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).create(fields).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        fields: &ValidProduct,
    ) -> Result<UpdateOutcome, RepositoryError> {
        ProductRepository::new(&self.pool).update(id, fields).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).delete(id).await
    }
}
