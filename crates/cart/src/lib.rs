//! Prickly Pear Cart - client-side cart state engine.
//!
//! The storefront UI is presentational; everything stateful about the cart
//! lives here:
//!
//! - [`cache`] - a namespaced, TTL-bound, version-tagged cache layered over
//!   durable client [`storage`]
//! - [`hydrate`] - one-shot reconciliation of server-issued authentication
//!   state with client-persisted credentials
//! - [`summary`] - discount reconciliation producing the totals block
//! - [`engine`] - cart ownership: mutations, persistence, recovery, and the
//!   abandoned-cart timer
//! - [`remote`] - the identity / order-service / recovery collaborators,
//!   as traits with HTTP implementations
//!
//! # Runtime model
//!
//! The engine targets a single cooperative runtime (one UI thread). Cart
//! mutations serialize through one async mutex and carry a revision counter
//! so an in-flight network response can never overwrite newer local state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod hydrate;
pub mod remote;
pub mod storage;
pub mod summary;
pub mod timer;

pub use cache::{CacheError, CacheSettings, TtlTier, VersionedCache, keys};
pub use config::{ConfigError, EngineConfig, EngineSettings, RemoteConfig};
pub use engine::{CartEngine, RecoveryRecord};
pub use error::{CartError, EngineError, Result};
pub use hydrate::{AuthHydrator, ServerSession};
pub use remote::{
    HttpRecoveryNotifier, IdentityClient, IdentityProvider, OrderServiceClient, RecoveryNotifier,
    RemoteError, SummaryService,
};
pub use storage::{FileStore, MemoryStore, StorageBackend, StorageError};
pub use summary::{Summary, reconcile};
pub use timer::AbandonedCartTimer;
