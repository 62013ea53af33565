//! Core types for the Prickly Pear cart engine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod identity;
pub mod money;
pub mod summary;
pub mod token;

pub use cart::{BundleDiscount, Cart, CartItem, CartItemError, Coupon};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{Credentials, Identity};
pub use money::{CurrencyCode, Money};
pub use summary::{CartSummary, ServerSummary};
pub use token::AuthToken;
