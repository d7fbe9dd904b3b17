//! Product repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use gift_registry_core::{BlobKey, ProductId, Quantity, QuantityError, ValidProduct};

use super::{RepositoryError, UpdateOutcome};
use crate::models::Product;

const PRODUCT_COLUMNS: &str =
    "id, name, description, image_key, desired_quantity, current_quantity, created_at";

/// Raw `registry.product` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    image_key: String,
    desired_quantity: i32,
    current_quantity: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let image_key = BlobKey::parse(&row.image_key).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid image key in database: {e}"))
        })?;
        let quantity = Quantity::new(row.desired_quantity, row.current_quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            image_key,
            quantity,
            created_at: row.created_at,
        })
    }
}

/// Lock a product row for the rest of the surrounding transaction.
pub(crate) async fn lock_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM registry.product WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(Product::try_from).transpose()
}

/// Write a new gifted count to a locked product row.
pub(crate) async fn set_current_quantity(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: Quantity,
) -> Result<Product, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE registry.product SET current_quantity = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(quantity.current())
    .fetch_one(conn)
    .await?;

    Product::try_from(row)
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM registry.product ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM registry.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Insert a product with a gifted count of zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, fields: &ValidProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO registry.product (name, description, image_key, desired_quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.image_key.as_str())
        .bind(fields.desired_quantity)
        .fetch_one(self.pool)
        .await?;

        Product::try_from(row)
    }

    /// Replace the editable fields of a product.
    ///
    /// The row is locked first so a concurrent gift cannot raise the count
    /// above the new desired quantity between the check and the write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn update(
        &self,
        id: ProductId,
        fields: &ValidProduct,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(existing) = lock_product(&mut tx, id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };

        match existing.quantity.with_desired(fields.desired_quantity) {
            Ok(_) => {}
            Err(QuantityError::BelowGifted { gifted }) => {
                return Ok(UpdateOutcome::BelowGifted { gifted });
            }
            Err(e) => return Err(RepositoryError::DataCorruption(e.to_string())),
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE registry.product
            SET name = $2, description = $3, image_key = $4, desired_quantity = $5
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.image_key.as_str())
        .bind(fields.desired_quantity)
        .fetch_one(&mut *tx)
        .await?;

        let product = Product::try_from(row)?;
        tx.commit().await?;

        Ok(UpdateOutcome::Updated {
            product,
            previous_image_key: existing.image_key,
        })
    }

    /// Delete a product. Gift rows go with it via `ON DELETE CASCADE`.
    ///
    /// # Returns
    ///
    /// The deleted product, or `None` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "DELETE FROM registry.product WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }
}
