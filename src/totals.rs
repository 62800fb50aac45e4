//! Cart totals: subtotal, tax and grand total.
//!
//! The same figures are shown at the counter, submitted with the order and
//! sent to the payment gateway, so every caller goes through
//! [`compute_totals`].

use serde::Serialize;

use crate::models::CartLine;

/// Tax rate applied when neither the counter nor the settings supply one.
pub const DEFAULT_TAX_PERCENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub grand_total: f64,
    pub tax_percent: f64,
}

/// Clamp a user-entered tax rate: negative or non-finite values become 0.
pub fn sanitize_tax_percent(tax_percent: f64) -> f64 {
    if tax_percent.is_finite() {
        tax_percent.max(0.0)
    } else {
        0.0
    }
}

pub fn compute_totals(lines: &[CartLine], tax_percent: f64) -> Totals {
    let tax_percent = sanitize_tax_percent(tax_percent);
    let subtotal: f64 = lines.iter().map(CartLine::line_total).sum();
    let tax = subtotal * (tax_percent / 100.0);
    Totals {
        subtotal,
        tax,
        grand_total: subtotal + tax,
        tax_percent,
    }
}

/// Convert a major-unit amount to integer minor units (rupees to paise).
pub fn minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, price: f64, qty: u32) -> CartLine {
        CartLine {
            item_id: id.to_string(),
            name: format!("Item {id}"),
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn computes_subtotal_tax_and_grand_total() {
        let totals = compute_totals(&[line("A", 100.0, 2)], 10.0);
        assert_eq!(totals.subtotal, 200.0);
        assert_eq!(totals.tax, 20.0);
        assert_eq!(totals.grand_total, 220.0);
    }

    #[test]
    fn totals_scale_linearly_with_quantity() {
        let base = vec![line("A", 12.5, 1), line("B", 3.0, 4)];
        let scaled: Vec<CartLine> = base
            .iter()
            .map(|l| CartLine {
                quantity: l.quantity * 3,
                ..l.clone()
            })
            .collect();
        let a = compute_totals(&base, 18.0);
        let b = compute_totals(&scaled, 18.0);
        assert!((b.subtotal - a.subtotal * 3.0).abs() < 1e-9);
        assert!((b.grand_total - a.grand_total * 3.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_tax_percent_is_clamped_to_zero() {
        let lines = [line("A", 50.0, 1)];
        for bad in [-5.0, f64::NAN, f64::INFINITY] {
            let totals = compute_totals(&lines, bad);
            assert_eq!(totals.tax, 0.0);
            assert_eq!(totals.grand_total, 50.0);
            assert_eq!(totals.tax_percent, 0.0);
        }
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let totals = compute_totals(&[], DEFAULT_TAX_PERCENT);
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.grand_total, 0.0);
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(minor_units(220.0), 22_000);
        assert_eq!(minor_units(60.6), 6_060);
        assert_eq!(minor_units(0.125), 13);
        assert_eq!(minor_units(0.0), 0);
    }
}
