use crate::model::{LineItem, Totals};

pub fn line_total(quantity: f64, unit_price: f64) -> f64 {
    quantity * unit_price
}

/// Computes the totals breakdown from already-priced items.
///
/// Each item's `total` is trusted as-is. Nothing is clamped or rounded, so a
/// discount larger than subtotal plus tax yields a negative total.
pub fn calculate_totals(items: &[LineItem], tax_rate_percent: f64, discount: f64) -> Totals {
    let subtotal: f64 = items.iter().map(|i| i.total).sum();
    let tax_amount = subtotal * tax_rate_percent / 100.0;
    let total = subtotal + tax_amount - discount;

    Totals {
        subtotal,
        tax_rate: tax_rate_percent,
        tax_amount,
        discount,
        total,
        balance_due: total,
    }
}
