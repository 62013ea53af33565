//! Integration tests for the Prickly Pear cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p prickly-pear-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - boot, save/load, and corruption flows
//! - `auth_hydration` - server/client identity reconciliation
//! - `cart_abandonment` - timer and recovery notification flows
//! - `discount_reconciliation` - local vs. server summary flows
//!
//! This crate's library is shared test support: in-process fakes for the
//! remote collaborators and a [`TestContext`] that wires an engine over
//! in-memory storage. Timer-driven tests run under a paused tokio clock,
//! so the full abandonment window elapses in microseconds of wall time.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use prickly_pear_cart::{
    AuthHydrator, CacheSettings, CartEngine, EngineSettings, IdentityProvider, MemoryStore,
    RecoveryNotifier, RemoteError, SummaryService, VersionedCache,
};
use prickly_pear_core::{
    AuthToken, Cart, Credentials, CurrencyCode, CustomerId, Email, Money, ServerSummary,
};

/// Install a test tracing subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Dollar helper for test amounts.
#[must_use]
pub fn usd(s: &str) -> Money {
    Money::new(s.parse().unwrap(), CurrencyCode::USD)
}

/// Test credentials with the given token.
#[must_use]
pub fn credentials(token: &str) -> Credentials {
    Credentials {
        customer_id: CustomerId::new("gid://shop/Customer/1"),
        email: Email::parse("shopper@example.com").unwrap(),
        token: AuthToken::new(token),
    }
}

// =============================================================================
// Fake remote collaborators
// =============================================================================

/// Identity endpoint fake: echoes back fixed credentials, or fails.
pub struct FakeIdentityApi {
    outcome: IdentityOutcome,
}

/// What the fake identity endpoint should do.
pub enum IdentityOutcome {
    /// Return credentials carrying the requesting token.
    Succeed,
    /// Reject the token.
    Unauthorized,
    /// Simulate a network failure.
    NetworkDown,
}

impl FakeIdentityApi {
    #[must_use]
    pub fn new(outcome: IdentityOutcome) -> Arc<Self> {
        Arc::new(Self { outcome })
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityApi {
    async fn fetch_profile(&self, token: &AuthToken) -> Result<Credentials, RemoteError> {
        match self.outcome {
            IdentityOutcome::Succeed => {
                let mut creds = credentials("ignored");
                creds.token = token.clone();
                Ok(creds)
            }
            IdentityOutcome::Unauthorized => Err(RemoteError::Unauthorized),
            IdentityOutcome::NetworkDown => Err(RemoteError::Api {
                status: 503,
                message: "service unavailable".to_owned(),
            }),
        }
    }
}

/// Order service fake: returns a fixed [`ServerSummary`] or fails, with an
/// optional gate to hold responses in flight.
pub struct FakeOrderService {
    response: Mutex<Option<ServerSummary>>,
    gate: Option<tokio::sync::Notify>,
}

impl FakeOrderService {
    /// A service that always fails (engine falls back to local totals).
    #[must_use]
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(None),
            gate: None,
        })
    }

    /// A service that returns `summary` on every call.
    #[must_use]
    pub fn returning(summary: ServerSummary) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(summary)),
            gate: None,
        })
    }

    /// A service that holds every response until [`Self::release`] - lets a
    /// test mutate the cart while a pricing call is in flight.
    #[must_use]
    pub fn gated(summary: ServerSummary) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(summary)),
            gate: Some(tokio::sync::Notify::new()),
        })
    }

    /// Let one held response through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl SummaryService for FakeOrderService {
    async fn price_cart(&self, _cart: &Cart) -> Result<ServerSummary, RemoteError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RemoteError::Api {
                status: 503,
                message: "service unavailable".to_owned(),
            })
    }
}

/// Recovery notifier fake that records every notification.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<(String, Cart)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The `(identity_key, cart)` pairs received so far.
    #[must_use]
    pub fn received(&self) -> Vec<(String, Cart)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecoveryNotifier for RecordingNotifier {
    async fn cart_abandoned(&self, identity_key: &str, cart: &Cart) -> Result<(), RemoteError> {
        self.notifications
            .lock()
            .unwrap()
            .push((identity_key.to_owned(), cart.clone()));
        Ok(())
    }
}

// =============================================================================
// Test context
// =============================================================================

/// A fully wired engine over in-memory storage.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub cache: VersionedCache,
    pub engine: CartEngine,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    /// Engine with an unavailable order service and a 60-second
    /// abandonment window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_order_service(FakeOrderService::unavailable())
    }

    /// Engine whose order service is under the test's control.
    #[must_use]
    pub fn with_order_service(orders: Arc<FakeOrderService>) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let cache = VersionedCache::new(store.clone(), CacheSettings::default());
        let notifier = RecordingNotifier::new();
        let engine = CartEngine::new(
            cache.clone(),
            orders,
            notifier.clone(),
            EngineSettings {
                abandon_after: std::time::Duration::from_secs(60),
                ..EngineSettings::default()
            },
        );
        Self {
            store,
            cache,
            engine,
            notifier,
        }
    }

    /// A second engine sharing this context's storage, as if the shopper
    /// came back in a new visit.
    #[must_use]
    pub fn next_visit(&self) -> CartEngine {
        CartEngine::new(
            self.cache.clone(),
            FakeOrderService::unavailable(),
            RecordingNotifier::new(),
            EngineSettings::default(),
        )
    }

    /// An unresolved hydrator sharing this context's storage.
    #[must_use]
    pub fn hydrator(&self, identity_api: Arc<FakeIdentityApi>) -> AuthHydrator {
        AuthHydrator::new(self.cache.clone(), identity_api)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
