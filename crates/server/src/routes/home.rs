//! Public gift list.

use std::collections::HashSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use gift_registry_core::ProductId;

use super::Notice;
use crate::cache::View;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Product};
use crate::state::AppState;

/// Query parameters of the gift list.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub notice: Option<String>,
    pub status: Option<String>,
}

/// One entry of the public list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: String,
    pub desired: i32,
    pub current: i32,
    pub remaining: i32,
    pub percent: u8,
    pub fulfilled: bool,
    pub user_has_gifted: bool,
}

impl ProductCard {
    fn new(product: &Product, gifted: &HashSet<ProductId>) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            image_url: super::image_url(&product.image_key),
            desired: product.quantity.desired(),
            current: product.quantity.current(),
            remaining: product.quantity.remaining(),
            percent: product.quantity.progress_percent(),
            fulfilled: product.is_fulfilled(),
            user_has_gifted: gifted.contains(&product.id),
        }
    }
}

/// Gift list page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: CurrentUser,
    pub products: Vec<ProductCard>,
    pub search: String,
    pub notice: Option<Notice>,
}

/// Build the cards for a listing, keeping only names matching `search`.
#[must_use]
pub fn product_cards(
    products: &[Product],
    gifted: &HashSet<ProductId>,
    search: &str,
) -> Vec<ProductCard> {
    let needle = search.trim().to_lowercase();
    products
        .iter()
        .filter(|p| p.name_matches(&needle))
        .map(|p| ProductCard::new(p, gifted))
        .collect()
}

/// Display the gift list, newest product first.
#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn home(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let products = state
        .views()
        .products(View::PublicListing, state.store())
        .await?;
    let gifted = state.store().gifted_product_ids(user.id).await?;

    let search = query.search.unwrap_or_default();
    let notice = Notice::from_query(query.notice, query.status.as_deref());

    Ok(HomeTemplate {
        products: product_cards(&products, &gifted, &search),
        user,
        search,
        notice,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use gift_registry_core::{BlobKey, Quantity};

    use super::*;

    fn product(id: i32, name: &str, desired: i32, current: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: None,
            image_key: BlobKey::parse("a1b2.png").unwrap(),
            quantity: Quantity::new(desired, current).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cards_carry_progress_and_gift_flag() {
        let products = vec![product(1, "Stand mixer", 4, 1), product(2, "Teapot", 1, 1)];
        let gifted = HashSet::from([ProductId::new(2)]);

        let cards = product_cards(&products, &gifted, "");
        assert_eq!(cards.len(), 2);

        assert_eq!(cards[0].remaining, 3);
        assert_eq!(cards[0].percent, 25);
        assert!(!cards[0].fulfilled);
        assert!(!cards[0].user_has_gifted);
        assert_eq!(cards[0].image_url, "/api/images/a1b2.png");

        assert!(cards[1].fulfilled);
        assert!(cards[1].user_has_gifted);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let products = vec![product(1, "Stand Mixer", 1, 0), product(2, "Teapot", 1, 0)];

        let cards = product_cards(&products, &HashSet::new(), "  MIX ");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, ProductId::new(1));

        assert!(product_cards(&products, &HashSet::new(), "blender").is_empty());
    }
}
