//! Unified error handling for the cart engine.
//!
//! Subsystems carry their own error enums; `EngineError` aggregates them at
//! the public API surface. Validation failures get their own type so the UI
//! can match on them without string inspection.

use thiserror::Error;

use prickly_pear_core::{CartItemError, ProductId};

use crate::cache::CacheError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// A rejected cart mutation. The cart is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantity must be a positive integer.
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),

    /// The referenced product is not in the cart.
    #[error("product not in cart: {0}")]
    UnknownProduct(ProductId),

    /// Prices and discounts must not be negative.
    #[error("amount must not be negative")]
    NegativeAmount,
}

impl From<CartItemError> for CartError {
    fn from(err: CartItemError) -> Self {
        match err {
            CartItemError::InvalidQuantity(quantity) => Self::InvalidQuantity(quantity),
            CartItemError::NegativePrice => Self::NegativeAmount,
        }
    }
}

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A mutation was rejected; the cart is unchanged.
    #[error("invalid cart mutation: {0}")]
    Validation(#[from] CartError),

    /// The versioned cache could not encode or store a value.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Durable client storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A remote collaborator failed.
    #[error("remote service error: {0}")]
    Remote(#[from] RemoteError),

    /// The cart changed while an asynchronous write was in flight; the
    /// stale result was discarded. Retry against current state if needed.
    #[error("cart changed while a write was in flight")]
    StaleWrite,
}

/// Result type alias for [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
