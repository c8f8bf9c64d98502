//! Price arithmetic for cart display and order conversion.
//!
//! Unit-price selection and totalling are the invariants the Order Converter
//! freezes at checkout time, so they live here as pure functions shared by
//! every storage backend.

use rust_decimal::Decimal;

/// The price a buyer actually pays per unit.
///
/// The discount price wins whenever one is set; otherwise the list price
/// applies.
#[must_use]
pub fn effective_unit_price(price: Decimal, discount_price: Option<Decimal>) -> Decimal {
    discount_price.unwrap_or(price)
}

/// Subtotal for one cart or order line.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Total for a set of `(unit_price, quantity)` lines.
///
/// Computed exactly once at order creation and stored; never recomputed from
/// live product data afterwards.
#[must_use]
pub fn order_total(lines: impl IntoIterator<Item = (Decimal, u32)>) -> Decimal {
    lines
        .into_iter()
        .map(|(unit, qty)| line_total(unit, qty))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn discount_price_wins_when_present() {
        assert_eq!(effective_unit_price(dec(2000), Some(dec(1550))), dec(1550));
        assert_eq!(effective_unit_price(dec(2000), None), dec(2000));
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        assert_eq!(line_total(dec(999), 3), dec(2997));
        assert_eq!(line_total(dec(1000), 1), dec(1000));
    }

    #[test]
    fn order_total_sums_lines() {
        // (10.00 x 2) + (5.00 x 1) = 25.00
        let total = order_total([(dec(1000), 2), (dec(500), 1)]);
        assert_eq!(total, dec(2500));
    }

    #[test]
    fn order_total_of_no_lines_is_zero() {
        assert_eq!(order_total([]), Decimal::ZERO);
    }
}
