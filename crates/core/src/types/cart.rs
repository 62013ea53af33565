//! Cart domain model.
//!
//! The cart is owned exclusively by the engine's persistence layer; the UI
//! only ever sees clones of it. Items keep their insertion order so the
//! rendered cart is stable across mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::ProductId;
use crate::types::money::{CurrencyCode, Money};

/// Errors that can occur when constructing or adjusting a [`CartItem`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartItemError {
    /// Quantity must be a positive integer.
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),
    /// Unit price must not be negative.
    #[error("unit price must not be negative")]
    NegativePrice,
}

/// A single line in the cart.
///
/// `line_total` is always `unit_price * quantity`; both are recomputed by
/// the constructors so the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Number of units; always at least 1.
    pub quantity: u32,
    /// Price of a single unit.
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub line_total: Money,
}

impl CartItem {
    /// Create a new line item.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::InvalidQuantity`] for a zero quantity and
    /// [`CartItemError::NegativePrice`] for a negative unit price.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::InvalidQuantity(quantity));
        }
        if unit_price.amount.is_sign_negative() {
            return Err(CartItemError::NegativePrice);
        }
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            line_total: unit_price.times(quantity),
        })
    }

    /// Return a copy of this line with a new quantity and a recomputed
    /// line total.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::InvalidQuantity`] for a zero quantity.
    pub fn with_quantity(&self, quantity: u32) -> Result<Self, CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::InvalidQuantity(quantity));
        }
        Ok(Self {
            product_id: self.product_id.clone(),
            quantity,
            unit_price: self.unit_price,
            line_total: self.unit_price.times(quantity),
        })
    }
}

/// An applied coupon code with its resolved discount amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// The code the shopper entered.
    pub code: String,
    /// Discount amount the code resolves to.
    pub discount: Money,
}

/// An automatic bundle discount applied to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDiscount {
    /// Display name of the bundle promotion.
    pub name: String,
    /// Products that together triggered the bundle.
    pub product_ids: Vec<ProductId>,
    /// Discount amount for the bundle.
    pub discount: Money,
}

/// The shopper's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Store currency; every amount in the cart uses it.
    pub currency: CurrencyCode,
    /// Line items in insertion order.
    pub items: Vec<CartItem>,
    /// Applied coupon, if any.
    pub coupon: Option<Coupon>,
    /// Applied bundle discount, if any.
    pub bundle: Option<BundleDiscount>,
    /// Instant of the last mutation; drives abandoned-cart detection.
    pub last_modified_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart in the given currency.
    #[must_use]
    pub fn new(currency: CurrencyCode) -> Self {
        Self {
            currency,
            items: Vec::new(),
            coupon: None,
            bundle: None,
            last_modified_at: Utc::now(),
        }
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items
            .iter()
            .fold(Money::zero(self.currency), |acc, item| {
                acc.plus(item.line_total)
            })
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by product.
    #[must_use]
    pub fn find_item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Coupon discount amount, zero when no coupon is applied.
    #[must_use]
    pub fn coupon_discount(&self) -> Money {
        self.coupon
            .as_ref()
            .map_or_else(|| Money::zero(self.currency), |c| c.discount)
    }

    /// Bundle discount amount, zero when no bundle applies.
    #[must_use]
    pub fn bundle_discount(&self) -> Money {
        self.bundle
            .as_ref()
            .map_or_else(|| Money::zero(self.currency), |b| b.discount)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(CurrencyCode::default())
    }
}
