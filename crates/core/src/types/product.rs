//! Product rules: editable-field validation and the gifted-quantity transition.
//!
//! Every store implementation goes through [`Quantity`] when it gifts or
//! cancels, so "current never exceeds desired, never drops below zero" is
//! decided in one place.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::blob_key::BlobKey;

/// Minimum product name length, in characters.
pub const MIN_NAME_LENGTH: usize = 3;

// =============================================================================
// Field validation
// =============================================================================

/// Editable product field, used to name the offending field in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Name,
    Description,
    ImageKey,
    DesiredQuantity,
}

impl ProductField {
    /// Form/JSON field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::ImageKey => "image_key",
            Self::DesiredQuantity => "desired_quantity",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single invalid field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: ProductField,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: ProductField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Unvalidated product fields as submitted by the admin form.
///
/// `desired_quantity` stays textual here because form input arrives as text;
/// [`ProductDraft::validate`] coerces it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_key: String,
    pub desired_quantity: String,
}

/// Product fields that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub name: String,
    pub description: Option<String>,
    pub image_key: BlobKey,
    pub desired_quantity: i32,
}

impl ProductDraft {
    /// Convenience constructor for drafts built in code rather than forms.
    #[must_use]
    pub fn new(name: impl Into<String>, image_key: impl Into<String>, desired_quantity: i32) -> Self {
        Self {
            name: name.into(),
            description: None,
            image_key: image_key.into(),
            desired_quantity: desired_quantity.to_string(),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the draft, returning the first invalid field.
    ///
    /// Rules:
    /// - `name`: at least three characters after trimming
    /// - `description`: optional, blank is treated as absent
    /// - `image_key`: non-empty, a well-formed [`BlobKey`]
    /// - `desired_quantity`: a positive integer
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] naming the offending field.
    pub fn validate(&self) -> Result<ValidProduct, FieldError> {
        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_LENGTH {
            return Err(FieldError::new(
                ProductField::Name,
                format!("name must be at least {MIN_NAME_LENGTH} characters"),
            ));
        }

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned);

        let image_key = self.image_key.trim();
        if image_key.is_empty() {
            return Err(FieldError::new(ProductField::ImageKey, "an image is required"));
        }
        let image_key = BlobKey::parse(image_key)
            .map_err(|e| FieldError::new(ProductField::ImageKey, e.to_string()))?;

        let desired_quantity = self
            .desired_quantity
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                FieldError::new(
                    ProductField::DesiredQuantity,
                    "quantity must be a whole number greater than zero",
                )
            })?;

        Ok(ValidProduct {
            name: name.to_owned(),
            description,
            image_key,
            desired_quantity,
        })
    }
}

// =============================================================================
// Quantity transition
// =============================================================================

/// Reasons a quantity transition is refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity out of range: {current} of {desired}")]
    OutOfRange { desired: i32, current: i32 },
    #[error("item already fully gifted")]
    Fulfilled,
    #[error("no gifts to cancel")]
    NothingGifted,
    #[error("desired quantity cannot be lower than the {gifted} already gifted")]
    BelowGifted { gifted: i32 },
}

/// Desired and received counts of a product.
///
/// A `Quantity` always satisfies `0 <= current <= desired` and `desired > 0`;
/// every transition returns a new value or refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Quantity {
    desired: i32,
    current: i32,
}

impl Quantity {
    /// Build a quantity from stored counts.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::OutOfRange` when the counts break the invariant.
    pub const fn new(desired: i32, current: i32) -> Result<Self, QuantityError> {
        if desired <= 0 || current < 0 || current > desired {
            return Err(QuantityError::OutOfRange { desired, current });
        }
        Ok(Self { desired, current })
    }

    /// A fresh product with nothing gifted yet.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::OutOfRange` when `desired` is not positive.
    pub const fn fresh(desired: i32) -> Result<Self, QuantityError> {
        Self::new(desired, 0)
    }

    #[must_use]
    pub const fn desired(self) -> i32 {
        self.desired
    }

    #[must_use]
    pub const fn current(self) -> i32 {
        self.current
    }

    /// Units still open for gifting.
    #[must_use]
    pub const fn remaining(self) -> i32 {
        self.desired - self.current
    }

    #[must_use]
    pub const fn is_fulfilled(self) -> bool {
        self.current >= self.desired
    }

    /// Quantity after one more unit is gifted.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Fulfilled` when nothing remains.
    pub const fn gifted(self) -> Result<Self, QuantityError> {
        if self.is_fulfilled() {
            return Err(QuantityError::Fulfilled);
        }
        Ok(Self {
            desired: self.desired,
            current: self.current + 1,
        })
    }

    /// Quantity after one gift is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NothingGifted` when the count is already zero.
    pub const fn cancelled(self) -> Result<Self, QuantityError> {
        if self.current == 0 {
            return Err(QuantityError::NothingGifted);
        }
        Ok(Self {
            desired: self.desired,
            current: self.current - 1,
        })
    }

    /// Quantity with a new desired count, keeping what was already gifted.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::BelowGifted` when the new target is lower than
    /// the received count, or `OutOfRange` when it is not positive.
    pub const fn with_desired(self, desired: i32) -> Result<Self, QuantityError> {
        if desired > 0 && desired < self.current {
            return Err(QuantityError::BelowGifted {
                gifted: self.current,
            });
        }
        Self::new(desired, self.current)
    }

    /// Progress towards the desired count, 0 to 100.
    #[must_use]
    pub fn progress_percent(self) -> u8 {
        let percent = i64::from(self.current) * 100 / i64::from(self.desired);
        u8::try_from(percent.clamp(0, 100)).unwrap_or(100)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft::new("Coffee grinder", "4f1c.png", 2)
    }

    #[test]
    fn test_valid_draft() {
        let valid = draft().with_description("  burr, not blade ").validate().unwrap();
        assert_eq!(valid.name, "Coffee grinder");
        assert_eq!(valid.description.as_deref(), Some("burr, not blade"));
        assert_eq!(valid.image_key.as_str(), "4f1c.png");
        assert_eq!(valid.desired_quantity, 2);
    }

    #[test]
    fn test_short_name_rejected() {
        let mut d = draft();
        d.name = " ab ".to_owned();
        assert_eq!(d.validate().unwrap_err().field, ProductField::Name);
    }

    #[test]
    fn test_blank_description_is_none() {
        let valid = draft().with_description("   ").validate().unwrap();
        assert_eq!(valid.description, None);
    }

    #[test]
    fn test_missing_image_rejected() {
        let mut d = draft();
        d.image_key = String::new();
        let err = d.validate().unwrap_err();
        assert_eq!(err.field, ProductField::ImageKey);
        assert_eq!(err.message, "an image is required");
    }

    #[test]
    fn test_non_positive_or_textual_quantity_rejected() {
        for raw in ["0", "-3", "two", "", "1.5"] {
            let mut d = draft();
            d.desired_quantity = raw.to_owned();
            assert_eq!(
                d.validate().unwrap_err().field,
                ProductField::DesiredQuantity,
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn test_quantity_coerces_padded_input() {
        let mut d = draft();
        d.desired_quantity = " 4 ".to_owned();
        assert_eq!(d.validate().unwrap().desired_quantity, 4);
    }

    #[test]
    fn test_quantity_construction_enforces_invariant() {
        assert!(Quantity::new(2, 2).is_ok());
        assert_eq!(
            Quantity::new(2, 3),
            Err(QuantityError::OutOfRange {
                desired: 2,
                current: 3
            })
        );
        assert!(Quantity::new(0, 0).is_err());
        assert!(Quantity::new(1, -1).is_err());
    }

    #[test]
    fn test_gift_until_fulfilled() {
        let q = Quantity::fresh(2).unwrap();
        let q = q.gifted().unwrap();
        let q = q.gifted().unwrap();
        assert!(q.is_fulfilled());
        assert_eq!(q.remaining(), 0);
        assert_eq!(q.gifted(), Err(QuantityError::Fulfilled));
    }

    #[test]
    fn test_cancel_never_goes_negative() {
        let q = Quantity::fresh(1).unwrap();
        assert_eq!(q.cancelled(), Err(QuantityError::NothingGifted));
        let q = q.gifted().unwrap().cancelled().unwrap();
        assert_eq!(q.current(), 0);
    }

    #[test]
    fn test_lowering_desired_below_gifted_refused() {
        let q = Quantity::new(5, 3).unwrap();
        assert_eq!(q.with_desired(2), Err(QuantityError::BelowGifted { gifted: 3 }));
        assert!(q.with_desired(3).unwrap().is_fulfilled());
        assert_eq!(q.with_desired(8).unwrap().remaining(), 5);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Quantity::new(3, 0).unwrap().progress_percent(), 0);
        assert_eq!(Quantity::new(3, 1).unwrap().progress_percent(), 33);
        assert_eq!(Quantity::new(3, 3).unwrap().progress_percent(), 100);
    }
}
