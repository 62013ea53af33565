//! Authentication hydration.
//!
//! At boot the server may or may not have resolved a customer session. This
//! module reconciles that with whatever credentials the client persisted
//! last time, producing the single [`Identity`] the rest of the engine
//! reads. It runs exactly once per process lifetime; later calls return the
//! first resolution unchanged.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use prickly_pear_core::{Credentials, Identity};

use crate::cache::{TtlTier, VersionedCache, keys};
use crate::remote::{IdentityProvider, RemoteError};

/// Server-resolved session state handed to [`AuthHydrator::hydrate`].
///
/// Distinct from "no input": a server render that checked the session and
/// found nothing passes [`ServerSession::ConfirmedGuest`], while a static
/// render with no session context passes `None` to `hydrate`.
#[derive(Debug, Clone)]
pub enum ServerSession {
    /// The server confirmed there is no customer session.
    ConfirmedGuest,
    /// The server resolved a signed-in customer.
    Customer(Credentials),
}

/// One-shot identity resolver.
///
/// The [`OnceCell`] is both the exactly-once guard and the stale-response
/// guard: the server-provided and storage-fallback paths are mutually
/// exclusive, and an identity response that loses the race to first
/// resolution is dropped with the losing init future.
pub struct AuthHydrator {
    cache: VersionedCache,
    identity_api: Arc<dyn IdentityProvider>,
    resolved: OnceCell<Identity>,
}

impl AuthHydrator {
    /// Create an unresolved hydrator.
    #[must_use]
    pub fn new(cache: VersionedCache, identity_api: Arc<dyn IdentityProvider>) -> Self {
        Self {
            cache,
            identity_api,
            resolved: OnceCell::new(),
        }
    }

    /// The resolved identity, if hydration has run.
    #[must_use]
    pub fn current(&self) -> Option<&Identity> {
        self.resolved.get()
    }

    /// Whether hydration has completed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// Resolve the process identity.
    ///
    /// Safe to call from every mounting UI tree: the first call resolves,
    /// every later call (with any input) returns the same identity.
    #[instrument(skip(self, server), fields(server_provided = server.is_some()))]
    pub async fn hydrate(&self, server: Option<ServerSession>) -> &Identity {
        self.resolved
            .get_or_init(|| async move { self.resolve(server).await })
            .await
    }

    async fn resolve(&self, server: Option<ServerSession>) -> Identity {
        match server {
            Some(ServerSession::Customer(credentials)) => {
                // The session-transported token is fresher than anything we
                // cached; mirror it so API calls and the next boot agree.
                self.mirror(&credentials);
                debug!(customer = %credentials.customer_id, "adopted server-resolved customer");
                Identity::Customer(credentials)
            }
            Some(ServerSession::ConfirmedGuest) => {
                // Server-side logout: do NOT fall back to cached credentials,
                // and drop them so they cannot resurface next boot.
                self.cache.remove(keys::IDENTITY);
                debug!("server confirmed guest session");
                Identity::Guest
            }
            None => self.resolve_from_storage().await,
        }
    }

    /// No session context from the server: fall back to the persisted
    /// credential record and verify it against the identity endpoint.
    async fn resolve_from_storage(&self) -> Identity {
        // A corrupt record is evicted by the cache read itself.
        let Some(cached) = self.cache.get::<Credentials>(keys::IDENTITY) else {
            debug!("no persisted credentials; resolving as guest");
            return Identity::Guest;
        };

        match self.identity_api.fetch_profile(&cached.token).await {
            Ok(fresh) => {
                self.mirror(&fresh);
                debug!(customer = %fresh.customer_id, "restored customer from persisted credentials");
                Identity::Customer(fresh)
            }
            Err(RemoteError::Unauthorized) => {
                // The token was revoked server-side; the record is dead.
                self.cache.remove(keys::IDENTITY);
                debug!("persisted token rejected; resolving as guest");
                Identity::Guest
            }
            Err(e) => {
                // Transient failure: resolve as guest for this process, keep
                // the record so the next boot can try again. No retry here.
                warn!(error = %e, "identity endpoint unreachable; resolving as guest");
                Identity::Guest
            }
        }
    }

    fn mirror(&self, credentials: &Credentials) {
        if let Err(e) = self.cache.set(keys::IDENTITY, credentials, TtlTier::Day) {
            warn!(error = %e, "failed to mirror credentials to storage");
        }
    }
}
