//! Integration tests for the gift and cancel-gift transitions.
//!
//! Run against the in-memory store through the public service API.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use gift_registry_core::ProductId;
use gift_registry_integration_tests::{Harness, guest};
use gift_registry_server::cache::View;
use gift_registry_server::db::RegistryStore;
use gift_registry_server::services::ErrorKind;
use tokio::task::JoinSet;

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gifts_never_exceed_desired_quantity() {
    let harness = Arc::new(Harness::new());
    let desired = 3;
    let extra = 7;
    let product = harness.product("Stand mixer", desired).await;

    let product_id = product.id;
    let mut tasks = JoinSet::new();
    for user in 0..desired + extra {
        let harness = Arc::clone(&harness);
        tasks.spawn(async move {
            let caller = guest(user);
            harness.gifts.gift(Some(&caller), product_id).await
        });
    }

    let mut successes = 0;
    let mut fulfilled = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(p) => {
                assert!(p.quantity.current() <= desired);
                successes += 1;
            }
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::AlreadyFulfilled);
                fulfilled += 1;
            }
        }
    }

    assert_eq!(successes, desired);
    assert_eq!(fulfilled, extra);
    assert_eq!(harness.reload(&product).await.quantity.current(), desired);
    assert_eq!(
        harness.store.count_gifts(product.id).await.unwrap(),
        i64::from(desired)
    );
}

// =============================================================================
// Example Scenario
// =============================================================================

#[tokio::test]
async fn test_two_unit_product_walkthrough() {
    let harness = Harness::new();
    let product = harness.product("Espresso machine", 2).await;
    let (a, b, c) = (guest(1), guest(2), guest(3));

    let after = harness.gifts.gift(Some(&a), product.id).await.unwrap();
    assert_eq!(after.quantity.current(), 1);
    assert!(
        harness
            .store
            .gifted_product_ids(a.user_id)
            .await
            .unwrap()
            .contains(&product.id)
    );

    let after = harness.gifts.gift(Some(&b), product.id).await.unwrap();
    assert_eq!(after.quantity.current(), 2);
    assert!(after.is_fulfilled());

    let err = harness.gifts.gift(Some(&c), product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyFulfilled);
    assert_eq!(harness.reload(&product).await.quantity.current(), 2);

    let after = harness.gifts.cancel_gift(Some(&a), product.id).await.unwrap();
    assert_eq!(after.quantity.current(), 1);
    assert!(
        harness
            .store
            .gifted_product_ids(a.user_id)
            .await
            .unwrap()
            .is_empty()
    );

    let after = harness.gifts.gift(Some(&c), product.id).await.unwrap();
    assert_eq!(after.quantity.current(), 2);
}

// =============================================================================
// Round Trip and Failures
// =============================================================================

#[tokio::test]
async fn test_gift_then_cancel_restores_quantity() {
    let harness = Harness::new();
    let product = harness.product("Dutch oven", 4).await;
    harness.gifts.gift(Some(&guest(9)), product.id).await.unwrap();
    let before = harness.reload(&product).await.quantity.current();

    let user = guest(1);
    harness.gifts.gift(Some(&user), product.id).await.unwrap();
    harness.gifts.cancel_gift(Some(&user), product.id).await.unwrap();

    assert_eq!(harness.reload(&product).await.quantity.current(), before);
    assert!(
        !harness
            .store
            .gifted_product_ids(user.user_id)
            .await
            .unwrap()
            .contains(&product.id)
    );
}

#[tokio::test]
async fn test_cancel_without_gift_is_not_found() {
    let harness = Harness::new();
    let product = harness.product("Picnic basket", 2).await;
    harness.gifts.gift(Some(&guest(1)), product.id).await.unwrap();
    let signals = harness.invalidator.count();

    // Another user's gift cannot be cancelled.
    let err = harness
        .gifts
        .cancel_gift(Some(&guest(2)), product.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "no gift by this user for this product");
    assert_eq!(harness.reload(&product).await.quantity.current(), 1);
    assert_eq!(harness.invalidator.count(), signals);
}

#[tokio::test]
async fn test_gift_unknown_product_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .gifts
        .gift(Some(&guest(1)), ProductId::new(404))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "product not found");
}

#[tokio::test]
async fn test_anonymous_caller_is_unauthenticated() {
    let harness = Harness::new();
    let product = harness.product("Bath towels", 2).await;

    let err = harness.gifts.gift(None, product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    let err = harness.gifts.cancel_gift(None, product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    assert_eq!(harness.reload(&product).await.quantity.current(), 0);
}

#[tokio::test]
async fn test_same_user_may_gift_twice_and_cancel_one() {
    let harness = Harness::new();
    let product = harness.product("Chef's knife", 3).await;
    let user = guest(1);

    harness.gifts.gift(Some(&user), product.id).await.unwrap();
    harness.gifts.gift(Some(&user), product.id).await.unwrap();
    assert_eq!(harness.store.count_gifts(product.id).await.unwrap(), 2);

    let after = harness.gifts.cancel_gift(Some(&user), product.id).await.unwrap();
    assert_eq!(after.quantity.current(), 1);
    assert_eq!(harness.store.count_gifts(product.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_store_failure_is_internal_without_invalidation() {
    let harness = Harness::new();
    let product = harness.product("Linen duvet cover", 2).await;
    let signals = harness.invalidator.count();

    harness.store.set_unavailable(true);
    let err = harness.gifts.gift(Some(&guest(1)), product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.message(), "something went wrong, please try again");
    harness.store.set_unavailable(false);

    assert_eq!(harness.invalidator.count(), signals);
    assert_eq!(harness.reload(&product).await.quantity.current(), 0);
}

#[tokio::test]
async fn test_success_invalidates_both_views() {
    let harness = Harness::new();
    let product = harness.product("Cast iron skillet", 1).await;
    let signals = harness.invalidator.count();

    harness.gifts.gift(Some(&guest(1)), product.id).await.unwrap();

    assert_eq!(harness.invalidator.count(), signals + 1);
    assert_eq!(
        harness.invalidator.last(),
        Some(HashSet::from(View::ALL))
    );
}

// =============================================================================
// Quantity Invariant
// =============================================================================

#[tokio::test]
async fn test_quantity_stays_in_range_over_mixed_sequence() {
    let harness = Harness::new();
    let desired = 2;
    let product = harness.product("Teapot", desired).await;

    // Interleave gifts and cancels, including ones that must be refused.
    let steps = [
        (1, true),
        (2, true),
        (3, true),
        (1, false),
        (1, false),
        (3, true),
        (2, false),
        (4, false),
        (4, true),
    ];
    for (user, is_gift) in steps {
        let caller = guest(user);
        let _ = if is_gift {
            harness.gifts.gift(Some(&caller), product.id).await
        } else {
            harness.gifts.cancel_gift(Some(&caller), product.id).await
        };

        let current = harness.reload(&product).await.quantity.current();
        assert!((0..=desired).contains(&current));
        assert_eq!(
            harness.store.count_gifts(product.id).await.unwrap(),
            i64::from(current)
        );
    }
}
