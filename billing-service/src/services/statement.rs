//! Statement reconciliation: merge invoices, payments and legacy
//! credits into one chronological running-balance ledger.
//!
//! The database layer fetches the candidate rows (status and date
//! filtered); everything that decides what ends up on the statement
//! (deduplication, ordering, the running balance) happens here so it
//! can be tested without a store.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CreditTransaction, Invoice, Payment};
use crate::services::amounts::round2;

/// Statement entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementEntryType {
    OpeningBalance,
    Invoice,
    Payment,
}

impl StatementEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementEntryType::OpeningBalance => "opening_balance",
            StatementEntryType::Invoice => "invoice",
            StatementEntryType::Payment => "payment",
        }
    }

    /// Sort rank at equal timestamps: invoices (debits) precede
    /// payments and credits.
    fn rank(&self) -> u8 {
        match self {
            StatementEntryType::OpeningBalance => 0,
            StatementEntryType::Invoice => 1,
            StatementEntryType::Payment => 2,
        }
    }
}

/// One row of the customer statement. Read model only, never persisted.
///
/// `amount` is signed: positive for debits (invoices), negative for
/// credits (payments and legacy credits). `balance` is the running
/// balance after this entry.
#[derive(Debug, Clone, Serialize)]
pub struct StatementEntry {
    pub date: DateTime<Utc>,
    pub reference: String,
    pub description: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub entry_type: StatementEntryType,
    pub entry_id: Uuid,
}

/// Reconciled customer statement.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub entries: Vec<StatementEntry>,
    /// Always zero today: the ledger is reconstructed from the queried
    /// window only. Extension point for a computed pre-range balance.
    pub opening_balance: Decimal,
    /// Running balance after the last entry in the window.
    pub closing_balance: Decimal,
    /// Sum of amount_due over the customer's live pending/overdue
    /// invoices, independent of the statement's date window. Can
    /// legitimately diverge from `closing_balance` when a narrow
    /// window is queried: outstanding reflects live invoice state,
    /// closing reflects the window.
    pub outstanding_balance: Decimal,
}

/// Build the reconciled statement from pre-fetched rows.
///
/// `invoice_numbers` maps invoice ids to display references for
/// payment descriptions; missing entries degrade the description
/// rather than failing the reconciliation.
pub fn build_statement(
    invoices: &[Invoice],
    payments: &[Payment],
    credits: &[CreditTransaction],
    invoice_numbers: &HashMap<Uuid, String>,
    outstanding_balance: Decimal,
) -> Statement {
    let mut entries: Vec<StatementEntry> = Vec::new();

    // Invoices appear as debits for their full total.
    for inv in invoices {
        if inv.is_deleted() || !inv.parsed_status().statement_visible() {
            continue;
        }
        let date = inv
            .issue_date
            .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc())
            .unwrap_or(inv.created_utc);
        entries.push(StatementEntry {
            date,
            reference: inv.reference(),
            description: format!("Invoice {}", inv.reference()),
            amount: round2(inv.total),
            balance: Decimal::ZERO,
            entry_type: StatementEntryType::Invoice,
            entry_id: inv.invoice_id,
        });
    }

    // Payments are credits; remember which legacy transactions they
    // already represent so those are not counted twice.
    let mut recorded_transactions: HashSet<Uuid> = HashSet::new();
    for payment in payments {
        if let Some(txn_id) = payment.transaction_id {
            recorded_transactions.insert(txn_id);
        }
        entries.push(StatementEntry {
            date: payment.paid_utc,
            reference: payment
                .payment_reference
                .clone()
                .unwrap_or_else(|| payment.payment_id.to_string()),
            description: payment_description(payment, invoice_numbers),
            amount: -round2(payment.amount.abs()),
            balance: Decimal::ZERO,
            entry_type: StatementEntryType::Payment,
            entry_id: payment.payment_id,
        });
    }

    // Surviving legacy credits: not already re-recorded as a payment.
    for credit in credits {
        if recorded_transactions.contains(&credit.transaction_id) {
            continue;
        }
        let Some(date) = credit.completed_utc else {
            continue;
        };
        entries.push(StatementEntry {
            date,
            reference: credit.transaction_id.to_string(),
            description: credit.description(),
            amount: -round2(credit.amount.abs()),
            balance: Decimal::ZERO,
            entry_type: StatementEntryType::Payment,
            entry_id: credit.transaction_id,
        });
    }

    // Chronological, with debits before credits at equal timestamps.
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.entry_type.rank().cmp(&b.entry_type.rank()))
    });

    let opening_balance = Decimal::ZERO;
    if !entries.is_empty() {
        let opening_date = entries[0].date;
        entries.insert(
            0,
            StatementEntry {
                date: opening_date,
                reference: String::new(),
                description: "Opening balance".to_string(),
                amount: Decimal::ZERO,
                balance: opening_balance,
                entry_type: StatementEntryType::OpeningBalance,
                entry_id: Uuid::nil(),
            },
        );
    }

    let mut running_balance = opening_balance;
    for entry in &mut entries {
        running_balance = round2(running_balance + entry.amount);
        entry.balance = running_balance;
    }
    let closing_balance = running_balance;

    Statement {
        entries,
        opening_balance,
        closing_balance,
        outstanding_balance,
    }
}

fn payment_description(payment: &Payment, invoice_numbers: &HashMap<Uuid, String>) -> String {
    let base = match invoice_numbers.get(&payment.invoice_id) {
        Some(number) => format!("Payment - {} for {}", payment.payment_method, number),
        None => format!("Payment - {}", payment.payment_method),
    };
    match &payment.payment_reference {
        Some(reference) => format!("{} ({})", base, reference),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn payment_at(date: DateTime<Utc>, amount: Decimal) -> Payment {
        Payment {
            payment_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount,
            payment_method: "card".to_string(),
            payment_reference: None,
            notes: None,
            paid_utc: date,
            transaction_id: None,
            created_utc: date,
        }
    }

    #[test]
    fn payment_description_includes_invoice_number_when_resolvable() {
        let date = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let mut payment = payment_at(date, dec!(10.00));
        payment.payment_reference = Some("TXN-9".to_string());

        let mut numbers = HashMap::new();
        numbers.insert(payment.invoice_id, "INV-1001".to_string());

        assert_eq!(
            payment_description(&payment, &numbers),
            "Payment - card for INV-1001 (TXN-9)"
        );
    }

    #[test]
    fn payment_description_degrades_without_invoice_number() {
        let date = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let payment = payment_at(date, dec!(10.00));
        assert_eq!(
            payment_description(&payment, &HashMap::new()),
            "Payment - card"
        );
    }

    #[test]
    fn empty_inputs_give_empty_statement_without_opening_row() {
        let statement = build_statement(&[], &[], &[], &HashMap::new(), Decimal::ZERO);
        assert!(statement.entries.is_empty());
        assert_eq!(statement.opening_balance, Decimal::ZERO);
        assert_eq!(statement.closing_balance, Decimal::ZERO);
    }

    #[test]
    fn negative_payment_amounts_still_credit_the_ledger() {
        // Defensive: stored payment amounts are positive, but a signed
        // source row must not flip into a debit.
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let payment = payment_at(date, dec!(-25.00));
        let statement = build_statement(&[], &[payment], &[], &HashMap::new(), Decimal::ZERO);
        // entries: opening + payment
        assert_eq!(statement.entries.len(), 2);
        assert_eq!(statement.entries[1].amount, dec!(-25.00));
        assert_eq!(statement.closing_balance, dec!(-25.00));
    }
}
