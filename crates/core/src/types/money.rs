//! Type-safe money representation using decimal arithmetic.
//!
//! All cart totals flow through this type so that rounding happens in
//! exactly one place (`round_display`) and negative intermediate values are
//! clamped rather than leaking into the UI.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Clamp negative amounts to zero, preserving the currency.
    ///
    /// Discounts and subtotals received from upstream are untrusted;
    /// totals shown to the shopper must never be negative.
    #[must_use]
    pub fn clamped_non_negative(self) -> Self {
        if self.amount.is_sign_negative() {
            Self::zero(self.currency_code)
        } else {
            self
        }
    }

    /// Multiply by an item quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add another amount. The currency of `self` is kept; a single cart
    /// never mixes currencies.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self::new(self.amount + other.amount, self.currency_code)
    }

    /// Subtract another amount, clamping the result at zero.
    #[must_use]
    pub fn minus_clamped(self, other: Self) -> Self {
        Self::new(self.amount - other.amount, self.currency_code).clamped_non_negative()
    }

    /// The larger of two amounts.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.amount > self.amount { other } else { self }
    }

    /// Round to two decimal places for display and tax computation.
    ///
    /// Uses away-from-zero midpoint rounding, matching how the upstream
    /// order service rounds charges.
    #[must_use]
    pub fn round_display(self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency_code,
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}
