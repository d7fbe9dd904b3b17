//! Seed the registry with sample products for local development.
//!
//! Every product gets its own image key holding a placeholder PNG, so
//! deleting one seeded product never removes another's image.

use std::path::PathBuf;

use gift_registry_core::{BlobKey, ProductDraft};
use gift_registry_server::db::{self, PgRegistryStore, RegistryStore};
use gift_registry_server::media::{DiskMediaStore, MediaStore};
use tracing::info;

use super::{CommandError, database_url};

/// 1x1 transparent PNG.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Sample names and descriptions, cycled when more products are requested.
const SAMPLES: &[(&str, &str)] = &[
    ("Stand mixer", "Tilt-head, any colour but beige"),
    ("Cast iron skillet", "12 inch, pre-seasoned"),
    ("Linen duvet cover", "King size"),
    ("Espresso machine", "With a steam wand"),
    ("Chef's knife", "8 inch, German steel"),
    ("Picnic basket", "Set for four"),
    ("Dutch oven", "5.5 quart enamelled"),
    ("Bath towels", "Set of six, white"),
];

/// Build the `index`-th sample draft.
fn sample_draft(index: usize, image_key: &BlobKey) -> ProductDraft {
    let (name, description) = SAMPLES
        .iter()
        .cycle()
        .nth(index)
        .copied()
        .unwrap_or(("Surprise gift", "Anything you like"));
    let round = index / SAMPLES.len();
    let name = if round == 0 {
        name.to_owned()
    } else {
        format!("{name} #{}", round + 1)
    };
    let desired = i32::try_from(index % 4).unwrap_or(0) + 1;

    ProductDraft::new(name, image_key.as_str(), desired).with_description(description)
}

/// Insert `count` sample products.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an image cannot be
/// written.
pub async fn products(count: usize) -> Result<(), CommandError> {
    let database_url = database_url()?;
    let media_root = std::env::var("MEDIA_STORE_PATH")
        .map_or_else(|_| PathBuf::from("./data/media"), PathBuf::from);

    let pool = db::create_pool(&database_url).await?;
    let store = PgRegistryStore::new(pool);
    let media = DiskMediaStore::new(media_root);
    info!(count, media_root = %media.root().display(), "Seeding sample products");

    for index in 0..count {
        let image_key = BlobKey::generate(Some("placeholder.png"));
        media.put(&image_key, PLACEHOLDER_PNG.to_vec()).await?;

        let fields = sample_draft(index, &image_key).validate()?;
        let product = store.create_product(&fields).await?;
        info!(product_id = %product.id, name = %product.name, "Seeded product");
    }

    info!("Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_drafts_are_valid_and_distinct() {
        let key = BlobKey::generate(Some("placeholder.png"));
        let first = sample_draft(0, &key).validate().unwrap();
        let wrapped = sample_draft(SAMPLES.len(), &key).validate().unwrap();

        assert_eq!(first.name, "Stand mixer");
        assert_eq!(wrapped.name, "Stand mixer #2");
        assert_eq!(first.desired_quantity, 1);
        assert!(first.image_key.as_str().ends_with(".png"));
    }
}
