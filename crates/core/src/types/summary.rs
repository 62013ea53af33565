//! Cart summary types.
//!
//! [`CartSummary`] is derived, never persisted - it is always recomputed
//! from the cart and discount metadata, so stored cart state and displayed
//! totals cannot drift apart.

use serde::{Deserialize, Serialize};

use crate::types::money::{CurrencyCode, Money};

/// The totals block rendered on the cart and checkout pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// Sum of all line totals before discounts.
    pub subtotal: Money,
    /// Discount from the applied coupon, zero when absent.
    pub coupon_discount: Money,
    /// Discount from the applied bundle, zero when absent.
    pub bundle_discount: Money,
    /// The discount actually granted: the larger of coupon and bundle.
    pub total_discount: Money,
    /// `max(0, subtotal - total_discount)`.
    pub discounted_subtotal: Money,
    /// Tax on the discounted subtotal.
    pub tax: Money,
    /// `discounted_subtotal + tax`.
    pub total: Money,
}

impl CartSummary {
    /// An all-zero summary in the given currency (empty cart).
    #[must_use]
    pub fn zero(currency: CurrencyCode) -> Self {
        let zero = Money::zero(currency);
        Self {
            subtotal: zero,
            coupon_discount: zero,
            bundle_discount: zero,
            total_discount: zero,
            discounted_subtotal: zero,
            tax: zero,
            total: zero,
        }
    }
}

/// Authoritative totals returned by the remote order service.
///
/// Every field is optional: the service may price only part of the cart
/// (e.g., tax requires a shipping address it does not have yet). Present
/// fields take precedence over the locally computed value, field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub subtotal: Option<Money>,
    pub coupon_discount: Option<Money>,
    pub bundle_discount: Option<Money>,
    pub total_discount: Option<Money>,
    pub discounted_subtotal: Option<Money>,
    pub tax: Option<Money>,
    pub total: Option<Money>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::money::CurrencyCode;

    #[test]
    fn test_zero_summary() {
        let summary = CartSummary::zero(CurrencyCode::USD);
        assert!(summary.subtotal.is_zero());
        assert!(summary.total_discount.is_zero());
        assert!(summary.total.is_zero());
    }

    #[test]
    fn test_server_summary_partial_decode() {
        // The order service omits fields it cannot price yet.
        let json = r#"{"tax": {"amount": "1.50", "currency_code": "USD"}}"#;
        let summary: ServerSummary = serde_json::from_str(json).unwrap();
        assert!(summary.subtotal.is_none());
        assert!(summary.tax.is_some());
    }
}
