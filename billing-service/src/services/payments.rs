//! Payment invariants: guard checks and application.
//!
//! The database layer runs these inside its transaction against the
//! row-locked invoice, so no caller can apply a payment computed from
//! a stale balance. Kept pure so every invariant is testable without
//! a database.

use anyhow::anyhow;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::models::{Invoice, InvoiceStatus};
use crate::services::amounts::round2;

/// Outcome of applying a payment to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub status: InvoiceStatus,
}

/// Check every payment invariant against the current invoice state.
///
/// The amount itself (> 0) is validated at the DTO layer; everything
/// that depends on invoice state is classified here so callers get a
/// precise failure reason rather than a generic internal error.
pub fn validate_payment(invoice: &Invoice, amount: Decimal) -> Result<(), AppError> {
    if invoice.is_deleted() {
        return Err(AppError::NotFound(anyhow!("Invoice not found")));
    }

    match invoice.parsed_status() {
        InvoiceStatus::Draft => {
            return Err(AppError::InvalidState(anyhow!(
                "Cannot record a payment against a draft invoice"
            )));
        }
        InvoiceStatus::Cancelled => {
            return Err(AppError::InvalidState(anyhow!(
                "Cannot record a payment against a cancelled invoice"
            )));
        }
        InvoiceStatus::Refunded => {
            return Err(AppError::InvalidState(anyhow!(
                "Cannot record a payment against a refunded invoice"
            )));
        }
        _ => {}
    }

    if invoice.amount_due <= Decimal::ZERO {
        return Err(AppError::InvalidState(anyhow!(
            "Invoice {} is already paid",
            invoice.reference()
        )));
    }

    if amount > invoice.amount_due {
        return Err(AppError::InvalidState(anyhow!(
            "Payment amount {} exceeds amount due {} (overpayment)",
            amount,
            invoice.amount_due
        )));
    }

    Ok(())
}

/// Apply a validated payment amount to the invoice's monetary state.
///
/// `amount_due` is re-derived from the invariant, not decremented, so
/// it can never drift from `round(total - amount_paid, 2)`. Status
/// flips to paid at zero balance and is otherwise left as it was
/// (pending or overdue).
pub fn apply_payment(invoice: &Invoice, amount: Decimal) -> PaymentOutcome {
    let amount_paid = round2(invoice.amount_paid + amount);
    let amount_due = round2(invoice.total - amount_paid);
    let status = if amount_due == Decimal::ZERO {
        InvoiceStatus::Paid
    } else {
        invoice.parsed_status()
    };

    PaymentOutcome {
        amount_paid,
        amount_due,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn invoice(status: &str, total: Decimal, amount_paid: Decimal) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_number: Some("INV-1001".to_string()),
            status: status.to_string(),
            issue_date: Some(Utc::now().date_naive()),
            due_date: None,
            tax_rate: dec!(0.15),
            subtotal: total,
            tax_total: Decimal::ZERO,
            total,
            amount_paid,
            amount_due: round2(total - amount_paid),
            notes: None,
            created_utc: Utc::now(),
            deleted_utc: None,
        }
    }

    #[test]
    fn full_payment_marks_invoice_paid() {
        let inv = invoice("pending", dec!(115.00), Decimal::ZERO);
        validate_payment(&inv, dec!(115.00)).expect("full payment should pass");
        let outcome = apply_payment(&inv, dec!(115.00));
        assert_eq!(outcome.amount_paid, dec!(115.00));
        assert_eq!(outcome.amount_due, dec!(0.00));
        assert_eq!(outcome.status, InvoiceStatus::Paid);
    }

    #[test]
    fn partial_payment_keeps_status() {
        let inv = invoice("overdue", dec!(200.00), Decimal::ZERO);
        validate_payment(&inv, dec!(50.00)).expect("partial payment should pass");
        let outcome = apply_payment(&inv, dec!(50.00));
        assert_eq!(outcome.amount_due, dec!(150.00));
        assert_eq!(outcome.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn overpayment_is_rejected_outright() {
        let inv = invoice("pending", dec!(200.00), Decimal::ZERO);
        let err = validate_payment(&inv, dec!(250.00)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(err.to_string().contains("overpayment"));
    }

    #[test]
    fn already_paid_invoice_rejects_further_payments() {
        let inv = invoice("paid", dec!(100.00), dec!(100.00));
        let err = validate_payment(&inv, dec!(1.00)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(err.to_string().contains("already paid"));
    }

    #[test]
    fn draft_invoice_rejects_payments() {
        let inv = invoice("draft", dec!(100.00), Decimal::ZERO);
        let err = validate_payment(&inv, dec!(100.00)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn refunded_invoice_rejects_payments_even_with_a_balance() {
        // A refund can leave amount_due positive; money still must not
        // flow onto a refunded invoice.
        let inv = invoice("refunded", dec!(100.00), dec!(40.00));
        let err = validate_payment(&inv, dec!(10.00)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn soft_deleted_invoice_is_not_found() {
        let mut inv = invoice("pending", dec!(100.00), Decimal::ZERO);
        inv.deleted_utc = Some(Utc::now());
        let err = validate_payment(&inv, dec!(100.00)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn balance_invariant_holds_after_each_payment() {
        let mut inv = invoice("pending", dec!(50.00), Decimal::ZERO);
        for amount in [dec!(30.00), dec!(20.00)] {
            validate_payment(&inv, amount).expect("payment within balance");
            let outcome = apply_payment(&inv, amount);
            assert_eq!(outcome.amount_due, round2(inv.total - outcome.amount_paid));
            assert!(outcome.amount_due >= Decimal::ZERO);
            inv.amount_paid = outcome.amount_paid;
            inv.amount_due = outcome.amount_due;
            inv.status = outcome.status.as_str().to_string();
        }
        assert_eq!(inv.parsed_status(), InvoiceStatus::Paid);
    }
}
