//! Per-line amount calculation and invoice totals aggregation.
//!
//! Every derived monetary field is rounded to 2 decimal places
//! independently, because per-line figures are separately observable
//! on invoices and statements. Inputs are validated upstream in the
//! DTO layer; these functions have no error states.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::LineItem;

/// Round a monetary value to 2 decimal places, midpoint away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derived per-line amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    /// quantity * unit_price, rounded.
    pub amount: Decimal,
    /// amount * tax_rate, rounded.
    pub tax_amount: Decimal,
    /// Display unit price including tax.
    pub rate_inclusive: Decimal,
    /// amount + tax_amount, rounded.
    pub total: Decimal,
}

/// Compute the derived amounts for one line.
///
/// `tax_rate` is a fraction (0.15 = 15%).
pub fn line_amounts(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal) -> LineAmounts {
    let amount = round2(quantity * unit_price);
    let tax_amount = round2(amount * tax_rate);
    let rate_inclusive = round2(unit_price * (Decimal::ONE + tax_rate));
    let total = round2(amount + tax_amount);

    LineAmounts {
        amount,
        tax_amount,
        rate_inclusive,
        total,
    }
}

/// Invoice-level totals, re-derivable from the current item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub amount_due: Decimal,
}

/// Aggregate invoice totals from its non-deleted items.
///
/// An empty item set resets subtotal/tax_total/total to zero;
/// `amount_due` always tracks `round(total - amount_paid, 2)`.
pub fn invoice_totals(items: &[LineItem], amount_paid: Decimal) -> InvoiceTotals {
    let live = items.iter().filter(|i| !i.is_deleted());

    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    for item in live {
        subtotal += item.amount;
        tax_total += item.tax_amount;
    }
    let subtotal = round2(subtotal);
    let tax_total = round2(tax_total);
    let total = round2(subtotal + tax_total);
    let amount_due = round2(total - amount_paid);

    InvoiceTotals {
        subtotal,
        tax_total,
        total,
        amount_due,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(amount: Decimal, tax_amount: Decimal, deleted: bool) -> LineItem {
        LineItem {
            line_item_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            chargeable_id: None,
            description: "test".to_string(),
            quantity: dec!(1),
            unit_price: amount,
            tax_rate: None,
            amount,
            tax_amount,
            rate_inclusive: amount,
            total: amount + tax_amount,
            created_utc: Utc::now(),
            deleted_utc: deleted.then(Utc::now),
        }
    }

    #[test]
    fn computes_standard_tax_exclusive_line() {
        let amounts = line_amounts(dec!(2), dec!(50.00), dec!(0.15));
        assert_eq!(amounts.amount, dec!(100.00));
        assert_eq!(amounts.tax_amount, dec!(15.00));
        assert_eq!(amounts.rate_inclusive, dec!(57.50));
        assert_eq!(amounts.total, dec!(115.00));
    }

    #[test]
    fn zero_tax_rate_yields_no_tax() {
        let amounts = line_amounts(dec!(3), dec!(19.99), Decimal::ZERO);
        assert_eq!(amounts.amount, dec!(59.97));
        assert_eq!(amounts.tax_amount, dec!(0.00));
        assert_eq!(amounts.rate_inclusive, dec!(19.99));
        assert_eq!(amounts.total, dec!(59.97));
    }

    #[test]
    fn rounds_each_derived_field_independently() {
        // 0.333 * 3 = 0.999 -> 1.00 on amount; tax then computed on the
        // rounded amount, not the raw product.
        let amounts = line_amounts(dec!(3), dec!(0.333), dec!(0.15));
        assert_eq!(amounts.amount, dec!(1.00));
        assert_eq!(amounts.tax_amount, dec!(0.15));
        assert_eq!(amounts.total, dec!(1.15));
    }

    #[test]
    fn line_total_within_one_cent_of_unrounded_product() {
        let cases = [
            (dec!(1), dec!(0.01), dec!(0.0)),
            (dec!(7), dec!(13.37), dec!(0.15)),
            (dec!(2.5), dec!(9.99), dec!(0.2)),
            (dec!(100), dec!(0.005), dec!(1.0)),
            (dec!(3), dec!(33.33), dec!(0.075)),
        ];
        for (q, p, t) in cases {
            let amounts = line_amounts(q, p, t);
            let exact = q * p * (Decimal::ONE + t);
            let drift = (amounts.total - exact).abs();
            assert!(
                drift <= dec!(0.01),
                "q={} p={} t={}: total {} drifted {} from {}",
                q,
                p,
                t,
                amounts.total,
                drift,
                exact
            );
        }
    }

    #[test]
    fn aggregates_totals_over_live_items() {
        let items = vec![
            item(dec!(100.00), dec!(15.00), false),
            item(dec!(50.00), dec!(7.50), false),
        ];
        let totals = invoice_totals(&items, Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(150.00));
        assert_eq!(totals.tax_total, dec!(22.50));
        assert_eq!(totals.total, dec!(172.50));
        assert_eq!(totals.amount_due, dec!(172.50));
    }

    #[test]
    fn deleted_items_are_excluded() {
        let items = vec![
            item(dec!(100.00), dec!(15.00), false),
            item(dec!(999.00), dec!(149.85), true),
        ];
        let totals = invoice_totals(&items, Decimal::ZERO);
        assert_eq!(totals.total, dec!(115.00));
    }

    #[test]
    fn empty_item_set_resets_totals_to_zero() {
        let totals = invoice_totals(&[], Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_total, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.amount_due, Decimal::ZERO);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let items = vec![
            item(dec!(33.33), dec!(5.00), false),
            item(dec!(66.67), dec!(10.00), false),
        ];
        let first = invoice_totals(&items, dec!(20.00));
        let second = invoice_totals(&items, dec!(20.00));
        assert_eq!(first, second);
    }

    #[test]
    fn amount_due_reflects_amount_paid() {
        let items = vec![item(dec!(100.00), dec!(15.00), false)];
        let totals = invoice_totals(&items, dec!(15.00));
        assert_eq!(totals.amount_due, dec!(100.00));
    }
}
