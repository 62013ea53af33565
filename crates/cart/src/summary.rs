//! Discount reconciliation.
//!
//! Produces the [`CartSummary`] consumed by the cart and checkout UI. The
//! summary is recomputed from the cart on every call and never stored, so
//! displayed totals cannot drift from persisted cart state.
//!
//! Discount policy: coupon and bundle discounts do NOT stack. The shopper
//! gets the larger of the two. This is a deliberate business rule; do not
//! "fix" it to additive stacking without a product decision.

use rust_decimal::Decimal;

use prickly_pear_core::{Cart, CartSummary, Money, ServerSummary};

/// Where a summary came from.
///
/// The order service is authoritative when it has priced the cart; its
/// fields win per-field over the local computation. When it is silent (or
/// unreachable) the local computation stands alone.
#[derive(Debug, Clone)]
pub enum Summary {
    /// Computed locally from the cart.
    Local(CartSummary),
    /// Authoritative totals from the remote order service.
    Server(ServerSummary),
}

/// Reconcile the cart and an optional authoritative server summary into
/// the summary to display.
///
/// Pure and idempotent: the same inputs always produce the same output.
#[must_use]
pub fn reconcile(cart: &Cart, server: Option<&ServerSummary>, tax_rate: Decimal) -> CartSummary {
    let source = match server {
        Some(authoritative) => Summary::Server(authoritative.clone()),
        None => Summary::Local(compute_local(cart, tax_rate)),
    };
    resolve(cart, &source, tax_rate)
}

/// Resolve a [`Summary`] to the concrete totals block.
#[must_use]
pub fn resolve(cart: &Cart, source: &Summary, tax_rate: Decimal) -> CartSummary {
    match source {
        Summary::Local(local) => *local,
        Summary::Server(server) => {
            let local = compute_local(cart, tax_rate);
            CartSummary {
                subtotal: pick(server.subtotal, local.subtotal),
                coupon_discount: pick(server.coupon_discount, local.coupon_discount),
                bundle_discount: pick(server.bundle_discount, local.bundle_discount),
                total_discount: pick(server.total_discount, local.total_discount),
                discounted_subtotal: pick(server.discounted_subtotal, local.discounted_subtotal),
                tax: pick(server.tax, local.tax),
                total: pick(server.total, local.total),
            }
        }
    }
}

/// Server field wins when present; either way the result is clamped
/// non-negative before display.
fn pick(server: Option<Money>, local: Money) -> Money {
    server.unwrap_or(local).clamped_non_negative()
}

/// The local computation: max-of-discounts, clamped subtraction, rounded
/// tax.
fn compute_local(cart: &Cart, tax_rate: Decimal) -> CartSummary {
    let subtotal = cart.subtotal().clamped_non_negative();

    // An empty cart renders as an all-zero block with no discount line.
    if subtotal.is_zero() {
        return CartSummary::zero(cart.currency);
    }

    let coupon_discount = cart.coupon_discount().clamped_non_negative();
    let bundle_discount = cart.bundle_discount().clamped_non_negative();

    // The larger benefit applies; discounts are not additive.
    let total_discount = coupon_discount.max(bundle_discount);

    let discounted_subtotal = subtotal.minus_clamped(total_discount);
    let tax = Money::new(discounted_subtotal.amount * tax_rate, cart.currency)
        .round_display()
        .clamped_non_negative();
    let total = discounted_subtotal.plus(tax);

    CartSummary {
        subtotal,
        coupon_discount,
        bundle_discount,
        total_discount,
        discounted_subtotal,
        tax,
        total,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prickly_pear_core::{BundleDiscount, CartItem, Coupon, CurrencyCode, ProductId};

    fn usd(s: &str) -> Money {
        Money::new(s.parse().unwrap(), CurrencyCode::USD)
    }

    fn rate(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn cart_with_items() -> Cart {
        let mut cart = Cart::default();
        cart.items
            .push(CartItem::new(ProductId::new("a"), 2, usd("100")).unwrap());
        cart
    }

    #[test]
    fn test_empty_cart_is_all_zeros() {
        let cart = Cart::default();
        let summary = reconcile(&cart, None, rate("0.10"));
        assert_eq!(summary, CartSummary::zero(CurrencyCode::USD));
    }

    #[test]
    fn test_larger_discount_wins_not_the_sum() {
        let mut cart = cart_with_items();
        cart.coupon = Some(Coupon {
            code: "SAVE50".to_owned(),
            discount: usd("50"),
        });
        cart.bundle = Some(BundleDiscount {
            name: "Duo".to_owned(),
            product_ids: vec![ProductId::new("a")],
            discount: usd("30"),
        });

        let summary = reconcile(&cart, None, Decimal::ZERO);
        assert_eq!(summary.coupon_discount, usd("50"));
        assert_eq!(summary.bundle_discount, usd("30"));
        assert_eq!(summary.total_discount, usd("50"));
        assert_eq!(summary.discounted_subtotal, usd("150"));
        assert_eq!(summary.total, usd("150"));
    }

    #[test]
    fn test_discount_larger_than_subtotal_clamps_to_zero() {
        let mut cart = cart_with_items();
        cart.coupon = Some(Coupon {
            code: "EVERYTHING".to_owned(),
            discount: usd("500"),
        });

        let summary = reconcile(&cart, None, rate("0.10"));
        assert_eq!(summary.discounted_subtotal, usd("0"));
        assert_eq!(summary.tax, usd("0"));
        assert_eq!(summary.total, usd("0"));
    }

    #[test]
    fn test_negative_discount_is_clamped_before_use() {
        let mut cart = cart_with_items();
        cart.coupon = Some(Coupon {
            code: "BROKEN".to_owned(),
            discount: usd("-10"),
        });

        let summary = reconcile(&cart, None, Decimal::ZERO);
        assert_eq!(summary.coupon_discount, usd("0"));
        assert_eq!(summary.total_discount, usd("0"));
        assert_eq!(summary.total, usd("200"));
    }

    #[test]
    fn test_tax_is_rounded_to_cents() {
        let mut cart = Cart::default();
        cart.items
            .push(CartItem::new(ProductId::new("a"), 1, usd("19.99")).unwrap());

        let summary = reconcile(&cart, None, rate("0.0875"));
        // 19.99 * 0.0875 = 1.749125 -> 1.75
        assert_eq!(summary.tax, usd("1.75"));
        assert_eq!(summary.total, usd("21.74"));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut cart = cart_with_items();
        cart.coupon = Some(Coupon {
            code: "SAVE50".to_owned(),
            discount: usd("50"),
        });

        let first = reconcile(&cart, None, rate("0.07"));
        let second = reconcile(&cart, None, rate("0.07"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_server_fields_win_per_field() {
        let cart = cart_with_items();
        let server = ServerSummary {
            tax: Some(usd("12.34")),
            total: Some(usd("212.34")),
            ..ServerSummary::default()
        };

        let summary = reconcile(&cart, Some(&server), rate("0.10"));
        // Fields the server priced are authoritative...
        assert_eq!(summary.tax, usd("12.34"));
        assert_eq!(summary.total, usd("212.34"));
        // ...everything it omitted falls back to the local computation.
        assert_eq!(summary.subtotal, usd("200"));
        assert_eq!(summary.discounted_subtotal, usd("200"));
    }

    #[test]
    fn test_server_negative_values_are_clamped() {
        let cart = cart_with_items();
        let server = ServerSummary {
            total_discount: Some(usd("-25")),
            ..ServerSummary::default()
        };

        let summary = reconcile(&cart, Some(&server), Decimal::ZERO);
        assert_eq!(summary.total_discount, usd("0"));
    }
}
