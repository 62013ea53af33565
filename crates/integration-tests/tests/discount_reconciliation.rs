//! Integration tests for discount reconciliation through the engine.
//!
//! Covers the local max-of-discounts policy, per-field precedence of the
//! order service's totals, the fallback when that service is down, and the
//! rejection of a stale in-flight pricing response.

#![allow(clippy::unwrap_used)]

use prickly_pear_cart::EngineError;
use prickly_pear_core::{BundleDiscount, ProductId, ServerSummary};

use prickly_pear_integration_tests::{FakeOrderService, TestContext, usd};

// =============================================================================
// Local Policy
// =============================================================================

#[tokio::test]
async fn test_coupon_and_bundle_do_not_stack() {
    let ctx = TestContext::new();
    let id = ProductId::new("tea-towel");
    ctx.engine.add_item(id.clone(), 2, usd("100")).await.unwrap();
    ctx.engine
        .apply_coupon("SAVE50".to_owned(), usd("50"))
        .await
        .unwrap();
    let summary = ctx
        .engine
        .apply_bundle(BundleDiscount {
            name: "Kitchen Duo".to_owned(),
            product_ids: vec![id],
            discount: usd("30"),
        })
        .await
        .unwrap();

    // The shopper gets the larger benefit, not the sum.
    assert_eq!(summary.total_discount, usd("50"));
    assert_eq!(summary.discounted_subtotal, usd("150"));

    // Dropping the coupon promotes the bundle discount.
    let summary = ctx.engine.remove_coupon().await;
    assert_eq!(summary.total_discount, usd("30"));
    assert_eq!(summary.discounted_subtotal, usd("170"));
}

#[tokio::test]
async fn test_summary_is_stable_across_reads() {
    let ctx = TestContext::new();
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("19.99"))
        .await
        .unwrap();

    let first = ctx.engine.summary().await;
    let second = ctx.engine.summary().await;
    assert_eq!(first, second);
}

// =============================================================================
// Server Precedence and Fallback
// =============================================================================

#[tokio::test]
async fn test_server_totals_win_per_field() {
    let orders = FakeOrderService::returning(ServerSummary {
        tax: Some(usd("17.40")),
        total: Some(usd("217.40")),
        ..ServerSummary::default()
    });
    let ctx = TestContext::with_order_service(orders);
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 2, usd("100"))
        .await
        .unwrap();

    let summary = ctx.engine.refresh_summary().await.unwrap();
    // The service priced tax and total; the rest is computed locally.
    assert_eq!(summary.tax, usd("17.40"));
    assert_eq!(summary.total, usd("217.40"));
    assert_eq!(summary.subtotal, usd("200"));
}

#[tokio::test]
async fn test_unreachable_order_service_falls_back_to_local() {
    let ctx = TestContext::new(); // order service always fails
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 2, usd("100"))
        .await
        .unwrap();

    let summary = ctx.engine.refresh_summary().await.unwrap();
    assert_eq!(summary.subtotal, usd("200"));
    assert_eq!(summary.total, usd("200"));
}

// =============================================================================
// In-Flight Staleness
// =============================================================================

#[tokio::test]
async fn test_stale_pricing_response_is_rejected() {
    let orders = FakeOrderService::gated(ServerSummary {
        total: Some(usd("999")),
        ..ServerSummary::default()
    });
    let ctx = TestContext::with_order_service(orders.clone());
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("100"))
        .await
        .unwrap();

    // Start pricing, then mutate the cart while the response is held.
    let engine = ctx.engine.clone();
    let in_flight = tokio::spawn(async move { engine.refresh_summary().await });
    tokio::task::yield_now().await;

    ctx.engine
        .add_item(ProductId::new("mug"), 1, usd("9"))
        .await
        .unwrap();
    orders.release();

    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(EngineError::StaleWrite)));

    // Current state is untouched by the discarded response.
    let summary = ctx.engine.summary().await;
    assert_eq!(summary.subtotal, usd("109"));
}

#[tokio::test]
async fn test_unchanged_cart_accepts_the_in_flight_response() {
    let orders = FakeOrderService::gated(ServerSummary {
        total: Some(usd("123.45")),
        ..ServerSummary::default()
    });
    let ctx = TestContext::with_order_service(orders.clone());
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("100"))
        .await
        .unwrap();

    let engine = ctx.engine.clone();
    let in_flight = tokio::spawn(async move { engine.refresh_summary().await });
    tokio::task::yield_now().await;

    // No mutation this time.
    orders.release();

    let summary = in_flight.await.unwrap().unwrap();
    assert_eq!(summary.total, usd("123.45"));
}
