//! Integration tests for cart persistence and recovery across visits.
//!
//! Each test wires a real engine over in-memory (or file-backed) storage
//! and plays through the boot sequence the storefront runs: purge stale
//! cache versions, hydrate identity, then restore the persisted cart.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use prickly_pear_cart::{
    CacheSettings, CartEngine, EngineSettings, FileStore, StorageBackend, VersionedCache, keys,
};
use prickly_pear_core::ProductId;

use prickly_pear_integration_tests::{FakeOrderService, RecordingNotifier, TestContext, usd};

// =============================================================================
// Save / Load Round Trips
// =============================================================================

#[tokio::test]
async fn test_fresh_visit_restores_nothing() {
    let ctx = TestContext::new();
    assert_eq!(ctx.cache.init(), 0);
    assert!(!ctx.engine.load_from_storage().await);
    assert!(ctx.engine.is_empty().await);
}

#[tokio::test]
async fn test_cart_survives_to_the_next_visit() {
    let ctx = TestContext::new();
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 2, usd("14.50"))
        .await
        .unwrap();
    ctx.engine
        .apply_coupon("WELCOME10".to_owned(), usd("10"))
        .await
        .unwrap();

    let next = ctx.next_visit();
    assert!(next.load_from_storage().await);

    let summary = next.summary().await;
    assert_eq!(summary.subtotal, usd("29.00"));
    assert_eq!(summary.coupon_discount, usd("10"));
    assert_eq!(summary.total, usd("19.00"));
    // A restored non-empty cart re-arms the abandonment timer.
    assert!(next.timer_armed().await);
}

#[tokio::test]
async fn test_corrupted_record_restores_nothing_and_is_discarded() {
    let ctx = TestContext::new();
    ctx.store.set("pp:cart", "{\"items\": 42}").unwrap();

    assert!(!ctx.engine.load_from_storage().await);
    assert!(ctx.engine.is_empty().await);
    // The unreadable record was purged, not left to fail every boot.
    assert_eq!(ctx.store.get("pp:cart").unwrap(), None);
}

#[tokio::test]
async fn test_emptied_cart_leaves_no_record_behind() {
    let ctx = TestContext::new();
    let id = ProductId::new("tea-towel");
    ctx.engine.add_item(id.clone(), 1, usd("14.50")).await.unwrap();
    ctx.engine.remove_item(&id).await.unwrap();

    let next = ctx.next_visit();
    assert!(!next.load_from_storage().await);
}

// =============================================================================
// Cache Version Bumps
// =============================================================================

#[tokio::test]
async fn test_deploy_with_new_cache_version_drops_old_cart() {
    let ctx = TestContext::new();
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("14.50"))
        .await
        .unwrap();

    // Next deploy ships an incompatible cart shape under a bumped version.
    let upgraded_cache = VersionedCache::new(
        ctx.store.clone(),
        CacheSettings {
            version: "2099-01".to_owned(),
            ..CacheSettings::default()
        },
    );
    let purged = upgraded_cache.init();
    assert_eq!(purged, 1);

    let engine = CartEngine::new(
        upgraded_cache,
        FakeOrderService::unavailable(),
        RecordingNotifier::new(),
        EngineSettings::default(),
    );
    assert!(!engine.load_from_storage().await);
    assert!(engine.is_empty().await);
}

#[tokio::test]
async fn test_version_sweep_spares_current_entries() {
    let ctx = TestContext::new();
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("14.50"))
        .await
        .unwrap();

    // Same version: the startup sweep must not eat the live cart.
    assert_eq!(ctx.cache.init(), 0);
    let next = ctx.next_visit();
    assert!(next.load_from_storage().await);
}

// =============================================================================
// File-Backed Storage
// =============================================================================

#[tokio::test]
async fn test_cart_survives_process_restart_on_disk() {
    let path = std::env::temp_dir().join(format!(
        "pp-cart-it-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let cache = VersionedCache::new(store, CacheSettings::default());
        let engine = CartEngine::new(
            cache,
            FakeOrderService::unavailable(),
            RecordingNotifier::new(),
            EngineSettings::default(),
        );
        engine
            .add_item(ProductId::new("tea-towel"), 3, usd("14.50"))
            .await
            .unwrap();
    }

    // "Restart": everything is rebuilt from the document on disk.
    let store = Arc::new(FileStore::open(&path).unwrap());
    let cache = VersionedCache::new(store, CacheSettings::default());
    cache.init();
    let engine = CartEngine::new(
        cache,
        FakeOrderService::unavailable(),
        RecordingNotifier::new(),
        EngineSettings::default(),
    );

    assert!(engine.load_from_storage().await);
    assert_eq!(engine.summary().await.subtotal, usd("43.50"));

    std::fs::remove_file(&path).unwrap();
}

// =============================================================================
// Explicit Save
// =============================================================================

#[tokio::test]
async fn test_explicit_save_writes_the_cart_record() {
    let ctx = TestContext::new();
    ctx.engine
        .add_item(ProductId::new("tea-towel"), 1, usd("14.50"))
        .await
        .unwrap();

    ctx.engine.save_to_storage().await.unwrap();
    assert!(ctx.store.get(&format!("pp:{}", keys::CART)).unwrap().is_some());
}
