//! Product and gift domain types.

use chrono::{DateTime, Utc};

use gift_registry_core::{BlobKey, GiftId, ProductId, Quantity, UserId};

/// A registry item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Weak reference into the media store.
    pub image_key: BlobKey,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether the desired count has been reached.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        self.quantity.is_fulfilled()
    }

    /// Case-insensitive substring match on the name.
    ///
    /// `needle` must already be lower-cased.
    #[must_use]
    pub fn name_matches(&self, needle: &str) -> bool {
        needle.is_empty() || self.name.to_lowercase().contains(needle)
    }
}

/// One unit of one product gifted by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    pub id: GiftId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matches_ignores_case() {
        let product = Product {
            id: ProductId::new(1),
            name: "Stand Mixer".to_owned(),
            description: None,
            image_key: BlobKey::parse("mixer.png").unwrap(),
            quantity: Quantity::fresh(1).unwrap(),
            created_at: Utc::now(),
        };
        assert!(product.name_matches("mixer"));
        assert!(product.name_matches(""));
        assert!(!product.name_matches("kettle"));
    }
}
