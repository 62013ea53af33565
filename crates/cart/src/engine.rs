//! Cart persistence engine.
//!
//! Owns the cart for the whole process: the UI never mutates cart state
//! directly, it calls this API. Every mutation validates its input,
//! recomputes line totals, stamps `last_modified_at`, persists, and
//! restarts the abandoned-cart timer as one logical unit under the state
//! lock.
//!
//! # Interleaving
//!
//! The runtime is a single cooperative thread, but the UI can still fire a
//! second mutation while an earlier async call is suspended. All mutations
//! serialize through one async mutex, and a `revision` counter lets
//! in-flight work detect that the cart moved underneath it - a slow network
//! response is rejected instead of overwriting newer local state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use prickly_pear_core::{
    BundleDiscount, Cart, CartItem, CartSummary, Coupon, Identity, Money, ProductId,
};

use crate::cache::{TtlTier, VersionedCache, keys};
use crate::config::EngineSettings;
use crate::error::{CartError, EngineError, Result};
use crate::remote::{RecoveryNotifier, SummaryService};
use crate::summary::reconcile;
use crate::timer::AbandonedCartTimer;

/// The record handed to the recovery notifier when a cart is abandoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    /// Customer email, or the anonymous session key for guests.
    pub identity_key: String,
    /// Snapshot of the cart at abandonment.
    pub cart: Cart,
    /// When the inactivity window elapsed.
    pub abandoned_at: DateTime<Utc>,
}

/// Whether abandonment should produce a recovery record.
#[derive(Debug)]
enum RecoveryMode {
    Disabled,
    Enabled { identity_key: String },
}

/// Everything guarded by the state lock.
struct CartState {
    cart: Cart,
    /// Bumped on every mutation; in-flight async work compares it at
    /// resolution time to detect staleness.
    revision: u64,
    abandoned: bool,
    recovery: RecoveryMode,
    timer: AbandonedCartTimer,
}

/// The cart engine.
///
/// Cheaply cloneable via `Arc`; all clones share one cart.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    cache: VersionedCache,
    summary_api: Arc<dyn SummaryService>,
    notifier: Arc<dyn RecoveryNotifier>,
    settings: EngineSettings,
    state: Mutex<CartState>,
}

impl CartEngine {
    /// Create an engine with an empty cart.
    ///
    /// Call [`Self::load_from_storage`] afterwards to restore a persisted
    /// cart from a previous visit.
    #[must_use]
    pub fn new(
        cache: VersionedCache,
        summary_api: Arc<dyn SummaryService>,
        notifier: Arc<dyn RecoveryNotifier>,
        settings: EngineSettings,
    ) -> Self {
        let cart = Cart::new(settings.currency);
        Self {
            inner: Arc::new(EngineInner {
                cache,
                summary_api,
                notifier,
                settings,
                state: Mutex::new(CartState {
                    cart,
                    revision: 0,
                    abandoned: false,
                    recovery: RecoveryMode::Disabled,
                    timer: AbandonedCartTimer::new(),
                }),
            }),
        }
    }

    /// The settings this engine was created with.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Restore the cart persisted by a previous visit.
    ///
    /// Returns whether a cart was restored. A missing, expired, or corrupt
    /// record restores nothing and leaves the default empty cart - no error
    /// reaches the UI.
    #[instrument(skip(self))]
    pub async fn load_from_storage(&self) -> bool {
        let Some(cart) = self.inner.cache.get::<Cart>(keys::CART) else {
            debug!("no persisted cart to restore");
            return false;
        };

        let mut state = self.inner.state.lock().await;
        state.cart = cart;
        state.revision += 1;
        state.abandoned = false;
        self.rearm_timer(&mut state);
        debug!(items = state.cart.items.len(), "restored persisted cart");
        true
    }

    /// Persist the current cart.
    ///
    /// Mutations persist automatically; this exists for explicit flushes
    /// (e.g., before navigation away).
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be encoded or written.
    pub async fn save_to_storage(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        self.inner.persist(&state.cart)?;
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity and
    /// [`CartError::NegativeAmount`] for a negative price; the cart is
    /// unchanged on error.
    #[instrument(skip(self, unit_price), fields(product = %product_id))]
    pub async fn add_item(
        &self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CartSummary> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity).into());
        }
        if unit_price.amount.is_sign_negative() {
            return Err(CartError::NegativeAmount.into());
        }

        let mut state = self.inner.state.lock().await;

        let updated = match state.cart.find_item(&product_id) {
            Some(existing) => {
                let merged = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::InvalidQuantity(quantity))?;
                // The latest price wins for the whole line.
                CartItem::new(product_id.clone(), merged, unit_price)
                    .map_err(CartError::from)?
            }
            None => CartItem::new(product_id.clone(), quantity, unit_price)
                .map_err(CartError::from)?,
        };

        if let Some(slot) = state
            .cart
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            *slot = updated;
        } else {
            state.cart.items.push(updated);
        }

        self.commit(&mut state, true);
        Ok(self.local_summary(&state.cart))
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for zero (use
    /// [`Self::remove_item`]) and [`CartError::UnknownProduct`] if the
    /// product is not in the cart.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartSummary> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity).into());
        }

        let mut state = self.inner.state.lock().await;

        let Some(slot) = state
            .cart
            .items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
        else {
            return Err(CartError::UnknownProduct(product_id.clone()).into());
        };
        *slot = slot.with_quantity(quantity).map_err(CartError::from)?;

        self.commit(&mut state, true);
        Ok(self.local_summary(&state.cart))
    }

    /// Remove a line entirely.
    ///
    /// Emptying the cart cancels the abandoned-cart timer and deletes the
    /// persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownProduct`] if the product is not in the
    /// cart.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<CartSummary> {
        let mut state = self.inner.state.lock().await;

        let before = state.cart.items.len();
        state.cart.items.retain(|item| &item.product_id != product_id);
        if state.cart.items.len() == before {
            return Err(CartError::UnknownProduct(product_id.clone()).into());
        }

        self.commit(&mut state, true);
        Ok(self.local_summary(&state.cart))
    }

    /// Empty the cart entirely (e.g., after a completed order).
    ///
    /// Cancels the timer and deletes the persisted cart and recovery
    /// records.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        state.cart = Cart::new(self.inner.settings.currency);
        state.revision += 1;
        state.abandoned = false;
        state.timer.cancel();
        self.inner.cache.remove(keys::CART);
        self.inner.cache.remove(keys::RECOVERY);
        debug!("cart cleared");
    }

    /// Apply a coupon with its resolved discount amount.
    ///
    /// Replaces any previously applied coupon. Does not restart the
    /// abandonment timer - only item changes count as shopper activity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NegativeAmount`] for a negative discount.
    #[instrument(skip(self, discount), fields(code = %code))]
    pub async fn apply_coupon(&self, code: String, discount: Money) -> Result<CartSummary> {
        if discount.amount.is_sign_negative() {
            return Err(CartError::NegativeAmount.into());
        }

        let mut state = self.inner.state.lock().await;
        state.cart.coupon = Some(Coupon { code, discount });
        self.commit(&mut state, false);
        Ok(self.local_summary(&state.cart))
    }

    /// Remove the applied coupon, if any.
    pub async fn remove_coupon(&self) -> CartSummary {
        let mut state = self.inner.state.lock().await;
        state.cart.coupon = None;
        self.commit(&mut state, false);
        self.local_summary(&state.cart)
    }

    /// Apply a bundle discount.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NegativeAmount`] for a negative discount.
    #[instrument(skip(self, bundle), fields(bundle = %bundle.name))]
    pub async fn apply_bundle(&self, bundle: BundleDiscount) -> Result<CartSummary> {
        if bundle.discount.amount.is_sign_negative() {
            return Err(CartError::NegativeAmount.into());
        }

        let mut state = self.inner.state.lock().await;
        state.cart.bundle = Some(bundle);
        self.commit(&mut state, false);
        Ok(self.local_summary(&state.cart))
    }

    /// Remove the applied bundle discount, if any.
    pub async fn remove_bundle(&self) -> CartSummary {
        let mut state = self.inner.state.lock().await;
        state.cart.bundle = None;
        self.commit(&mut state, false);
        self.local_summary(&state.cart)
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// The locally reconciled summary for the current cart.
    pub async fn summary(&self) -> CartSummary {
        let state = self.inner.state.lock().await;
        self.local_summary(&state.cart)
    }

    /// Ask the order service for authoritative totals and reconcile them.
    ///
    /// Falls back to the local computation if the service is unreachable -
    /// cart display is never blocked on this call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StaleWrite`] if the cart changed while the
    /// request was in flight; the caller may retry against current state.
    #[instrument(skip(self))]
    pub async fn refresh_summary(&self) -> Result<CartSummary> {
        let (snapshot, revision) = {
            let state = self.inner.state.lock().await;
            (state.cart.clone(), state.revision)
        };

        match self.inner.summary_api.price_cart(&snapshot).await {
            Ok(server) => {
                let state = self.inner.state.lock().await;
                if state.revision != revision {
                    debug!("discarding stale server summary");
                    return Err(EngineError::StaleWrite);
                }
                Ok(reconcile(
                    &state.cart,
                    Some(&server),
                    self.inner.settings.tax_rate,
                ))
            }
            Err(e) => {
                warn!(error = %e, "order service unavailable; using local totals");
                let state = self.inner.state.lock().await;
                Ok(self.local_summary(&state.cart))
            }
        }
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Enable abandoned-cart recovery for the given identity.
    ///
    /// Authenticated customers are keyed by email; guests get a persisted
    /// anonymous session key.
    #[instrument(skip(self, identity), fields(authenticated = identity.is_authenticated()))]
    pub async fn enable_recovery(&self, identity: &Identity) {
        let identity_key = identity
            .recovery_key()
            .map_or_else(|| self.anonymous_session_key(), str::to_owned);

        let mut state = self.inner.state.lock().await;
        state.recovery = RecoveryMode::Enabled { identity_key };
    }

    /// Disable recovery and delete any written recovery record.
    pub async fn disable_recovery(&self) {
        let mut state = self.inner.state.lock().await;
        state.recovery = RecoveryMode::Disabled;
        self.inner.cache.remove(keys::RECOVERY);
    }

    /// The stable anonymous key for this guest session, minting one on
    /// first use.
    fn anonymous_session_key(&self) -> String {
        if let Some(key) = self.inner.cache.get::<String>(keys::ANON_SESSION) {
            return key;
        }
        let key = format!("anon-{}", Uuid::new_v4());
        if let Err(e) = self
            .inner
            .cache
            .set(keys::ANON_SESSION, &key, TtlTier::Day)
        {
            warn!(error = %e, "failed to persist anonymous session key");
        }
        key
    }

    // =========================================================================
    // Abandonment timer
    // =========================================================================

    /// Arm the abandonment timer for the current cart.
    ///
    /// Mutations do this automatically; explicit arming is for restoring a
    /// session. An empty cart cancels instead.
    pub async fn start_abandoned_cart_timer(&self) {
        let mut state = self.inner.state.lock().await;
        self.rearm_timer(&mut state);
    }

    /// Cancel the abandonment timer. Idempotent.
    pub async fn clear_abandoned_cart_timer(&self) {
        let mut state = self.inner.state.lock().await;
        state.timer.cancel();
    }

    /// Whether the abandonment timer is currently armed.
    pub async fn timer_armed(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.timer.is_armed()
    }

    /// Whether the inactivity window elapsed without a mutation.
    pub async fn is_abandoned(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.abandoned
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// A snapshot of the current cart.
    pub async fn cart(&self) -> Cart {
        let state = self.inner.state.lock().await;
        state.cart.clone()
    }

    /// Total units across all lines.
    pub async fn item_count(&self) -> u32 {
        let state = self.inner.state.lock().await;
        state.cart.item_count()
    }

    /// Whether the cart has no items.
    pub async fn is_empty(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.cart.is_empty()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn local_summary(&self, cart: &Cart) -> CartSummary {
        reconcile(cart, None, self.inner.settings.tax_rate)
    }

    /// Finish a mutation: stamp, bump the revision, persist, and manage the
    /// timer. Called with the state lock held.
    fn commit(&self, state: &mut CartState, items_changed: bool) {
        state.cart.last_modified_at = Utc::now();
        state.revision += 1;
        state.abandoned = false;

        if let Err(e) = self.inner.persist(&state.cart) {
            // The in-memory mutation already succeeded; a failed write must
            // not take the cart away from the shopper.
            error!(error = %e, "failed to persist cart");
        }

        if items_changed {
            self.rearm_timer(state);
        }
    }

    /// Restart the single-shot abandonment timer for the current revision;
    /// an empty cart cancels it instead.
    fn rearm_timer(&self, state: &mut CartState) {
        if state.cart.is_empty() {
            state.timer.cancel();
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let armed_revision = state.revision;
        let delay = self.inner.settings.abandon_after;
        state.timer.arm(delay, async move {
            if let Some(inner) = weak.upgrade() {
                EngineInner::fire_abandonment(&inner, armed_revision).await;
            }
        });
    }
}

impl EngineInner {
    fn persist(&self, cart: &Cart) -> std::result::Result<(), crate::cache::CacheError> {
        if cart.is_empty() {
            // A stored empty cart would only shadow later version bumps.
            self.cache.remove(keys::CART);
            Ok(())
        } else {
            self.cache.set(keys::CART, cart, TtlTier::Day)
        }
    }

    /// The timer fired: mark the cart abandoned and hand off to the
    /// recovery notifier. Never mutates the cart items and never lets a
    /// notifier failure escape.
    async fn fire_abandonment(inner: &Arc<Self>, armed_revision: u64) {
        let notification = {
            let mut state = inner.state.lock().await;
            if state.revision != armed_revision {
                // A mutation raced the expiry; its own timer owns the window.
                return;
            }
            if state.cart.is_empty() {
                return;
            }
            state.abandoned = true;
            match &state.recovery {
                RecoveryMode::Enabled { identity_key } => {
                    Some((identity_key.clone(), state.cart.clone()))
                }
                RecoveryMode::Disabled => None,
            }
        };

        let Some((identity_key, cart)) = notification else {
            debug!("cart abandoned; recovery disabled");
            return;
        };

        let record = RecoveryRecord {
            identity_key: identity_key.clone(),
            cart: cart.clone(),
            abandoned_at: Utc::now(),
        };
        if let Err(e) = inner.cache.set(keys::RECOVERY, &record, TtlTier::Day) {
            warn!(error = %e, "failed to write recovery record");
        }

        // Fire-and-forget: failures are logged and swallowed so they cannot
        // corrupt cart state.
        if let Err(e) = inner.notifier.cart_abandoned(&identity_key, &cart).await {
            warn!(error = %e, "recovery notifier failed");
        }
    }
}
