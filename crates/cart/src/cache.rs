//! Versioned, TTL-bound cache over durable client storage.
//!
//! Every entry is wrapped in an envelope carrying the cache version it was
//! written under and an absolute expiry instant. An entry is readable only
//! while both checks pass; anything stale is purged on contact. Bumping
//! [`CACHE_VERSION`] therefore invalidates every previously written entry
//! without per-key migration logic.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{StorageBackend, StorageError};

/// Current cache payload version.
///
/// Bump this on every incompatible change to a cached payload shape. The
/// deployed version can also be overridden at startup via
/// `CART_CACHE_VERSION` (see [`crate::config::EngineConfig`]).
pub const CACHE_VERSION: &str = "2025-08";

/// Storage keys used by the engine.
///
/// All keys are namespaced by [`CacheSettings::namespace`] before they hit
/// the backend.
pub mod keys {
    /// Key for the persisted cart.
    pub const CART: &str = "cart";

    /// Key for the mirrored customer credentials.
    pub const IDENTITY: &str = "identity";

    /// Key for the anonymous session key used for guest recovery records.
    pub const ANON_SESSION: &str = "anon_session";

    /// Key for the abandoned-cart recovery record.
    pub const RECOVERY: &str = "recovery";
}

/// Named TTL tiers.
///
/// Callers pick a tier rather than a raw duration so cache lifetimes stay
/// consistent across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// One minute.
    Short,
    /// Five minutes.
    Medium,
    /// One hour.
    Long,
    /// Twenty-four hours.
    Day,
}

impl TtlTier {
    /// The fixed duration this tier maps to.
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        match self {
            Self::Short => TimeDelta::minutes(1),
            Self::Medium => TimeDelta::minutes(5),
            Self::Long => TimeDelta::hours(1),
            Self::Day => TimeDelta::hours(24),
        }
    }
}

/// Process-wide cache configuration.
///
/// Passed explicitly into [`VersionedCache::new`]; there is no ambient
/// global version state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Key namespace, prepended to every key as `"{namespace}:{key}"`.
    pub namespace: String,
    /// The version new entries are tagged with and old entries are checked
    /// against.
    pub version: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "pp".to_owned(),
            version: CACHE_VERSION.to_owned(),
        }
    }
}

/// Errors from cache writes.
///
/// Reads never error: a failed read is indistinguishable from a miss by
/// design, so rendering is never blocked on cache health.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be encoded into the envelope.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend rejected the write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The persisted envelope around every cached value.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CacheEntry {
    version: String,
    expires_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// Namespaced, TTL-bound, version-tagged cache.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct VersionedCache {
    store: Arc<dyn StorageBackend>,
    settings: CacheSettings,
}

impl VersionedCache {
    /// Create a cache over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn StorageBackend>, settings: CacheSettings) -> Self {
        Self { store, settings }
    }

    /// Startup lifecycle step: purge every entry written under a different
    /// cache version. Returns the number of entries removed.
    ///
    /// Run once per process start, before anything reads the cache, so a
    /// deploy that changed payload shapes can never feed stale-shape data
    /// to the engine.
    pub fn init(&self) -> usize {
        self.clear_stale_versions()
    }

    /// The settings this cache was created with.
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.settings.namespace)
    }

    /// Read a value.
    ///
    /// Returns the stored value only if it is unexpired and was written
    /// under the current cache version. Stale, corrupt, or unreadable
    /// entries are removed as a side effect and reported as absent -
    /// callers never see a cache failure.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);

        let raw = match self.store.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %full_key, error = %e, "purging corrupt cache entry");
                self.remove(key);
                return None;
            }
        };

        if entry.version != self.settings.version {
            debug!(key = %full_key, entry_version = %entry.version, "purging entry from previous cache version");
            self.remove(key);
            return None;
        }

        if entry.expires_at <= Utc::now() {
            debug!(key = %full_key, "purging expired cache entry");
            self.remove(key);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "purging cache entry with unexpected shape");
                self.remove(key);
                None
            }
        }
    }

    /// Store a value under the current version with the tier's TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the backend
    /// rejects the write.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, tier: TtlTier) -> Result<(), CacheError> {
        let entry = CacheEntry {
            version: self.settings.version.clone(),
            expires_at: Utc::now() + tier.duration(),
            value: serde_json::to_value(value)?,
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.set(&self.full_key(key), &raw)?;
        Ok(())
    }

    /// Delete an entry unconditionally. Best-effort: backend failures are
    /// logged, not surfaced.
    pub fn remove(&self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(e) = self.store.remove(&full_key) {
            warn!(key = %full_key, error = %e, "cache remove failed");
        }
    }

    /// Scan all persisted entries in this namespace and delete any not
    /// tagged with the current version. Returns the number removed.
    pub fn clear_stale_versions(&self) -> usize {
        let prefix = format!("{}:", self.settings.namespace);

        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache version sweep could not enumerate keys");
                return 0;
            }
        };

        let mut removed = 0;
        for full_key in keys {
            let Some(key) = full_key.strip_prefix(&prefix) else {
                continue;
            };

            let current = match self.store.get(&full_key) {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry>(&raw)
                    .is_ok_and(|entry| entry.version == self.settings.version),
                Ok(None) => continue,
                Err(_) => false,
            };

            if !current {
                self.remove(key);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, version = %self.settings.version, "purged entries from previous cache versions");
        }
        removed
    }
}
