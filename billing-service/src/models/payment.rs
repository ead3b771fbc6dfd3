//! Payment and payment audit models for billing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recorded payment against an invoice. Insert-only: payments are
/// created solely inside the atomic recorder and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    /// Denormalized from the invoice so statement queries do not join.
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub paid_utc: DateTime<Utc>,
    /// Link to the legacy credit transaction this payment re-records,
    /// used to deduplicate statement credits.
    pub transaction_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    /// Defaults to now when absent.
    pub paid_utc: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
}

/// Audit row written in the same transaction as every payment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAudit {
    pub audit_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    /// Invoice amount_due after this payment was applied.
    pub balance_after: Decimal,
    pub created_utc: DateTime<Utc>,
}
