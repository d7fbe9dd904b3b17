//! Gift repository: the gift and cancel transitions.

use std::collections::HashSet;

use sqlx::PgPool;

use gift_registry_core::{GiftId, ProductId, QuantityError, UserId};

use super::products::{lock_product, set_current_quantity};
use super::{CancelOutcome, GiftOutcome, RepositoryError};

/// Repository for gift database operations.
pub struct GiftRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GiftRepository<'a> {
    /// Create a new gift repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Gift one unit of a product on behalf of a user.
    ///
    /// Runs in one transaction: lock the product row, check the remaining
    /// count, increment it and insert the gift row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails. Nothing is
    /// committed in that case.
    pub async fn gift(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<GiftOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(product) = lock_product(&mut tx, product_id).await? else {
            return Ok(GiftOutcome::ProductNotFound);
        };

        let quantity = match product.quantity.gifted() {
            Ok(q) => q,
            Err(QuantityError::Fulfilled) => return Ok(GiftOutcome::Fulfilled),
            Err(e) => return Err(RepositoryError::DataCorruption(e.to_string())),
        };

        let product = set_current_quantity(&mut tx, product_id, quantity).await?;

        sqlx::query(
            r"
            INSERT INTO registry.gift (user_id, product_id)
            VALUES ($1, $2)
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(GiftOutcome::Gifted(product))
    }

    /// Cancel the user's oldest gift for a product.
    ///
    /// Locks the product row before the gift row, matching the order used by
    /// [`Self::gift`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    /// Returns `RepositoryError::DataCorruption` if a gift row exists while the
    /// product's count is already zero.
    pub async fn cancel(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<CancelOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(product) = lock_product(&mut tx, product_id).await? else {
            return Ok(CancelOutcome::NoGift);
        };

        let gift_id = sqlx::query_scalar::<_, GiftId>(
            r"
            SELECT id FROM registry.gift
            WHERE product_id = $1 AND user_id = $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(gift_id) = gift_id else {
            return Ok(CancelOutcome::NoGift);
        };

        let quantity = product.quantity.cancelled().map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "gift {gift_id} exists for product {product_id}: {e}"
            ))
        })?;

        sqlx::query("DELETE FROM registry.gift WHERE id = $1")
            .bind(gift_id)
            .execute(&mut *tx)
            .await?;

        let product = set_current_quantity(&mut tx, product_id, quantity).await?;

        tx.commit().await?;

        Ok(CancelOutcome::Cancelled(product))
    }

    /// Products a user currently holds a gift for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids_for_user(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            "SELECT DISTINCT product_id FROM registry.gift WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// Number of gift rows referencing a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_for_product(&self, product_id: ProductId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM registry.gift WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
