//! Payment request/response DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::items::{validate_positive, InvoiceTotalsResponse};
use crate::models::{Payment, RecordPayment};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,
    #[validate(length(min = 1, message = "Payment method cannot be empty"))]
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub paid_utc: Option<DateTime<Utc>>,
    /// Legacy credit transaction this payment re-records, if any.
    pub transaction_id: Option<Uuid>,
}

impl RecordPaymentRequest {
    pub fn into_input(self, tenant_id: Uuid, invoice_id: Uuid) -> RecordPayment {
        RecordPayment {
            tenant_id,
            invoice_id,
            amount: self.amount,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            notes: self.notes,
            paid_utc: self.paid_utc,
            transaction_id: self.transaction_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub paid_utc: DateTime<Utc>,
    pub transaction_id: Option<Uuid>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            invoice_id: payment.invoice_id,
            customer_id: payment.customer_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            payment_reference: payment.payment_reference,
            paid_utc: payment.paid_utc,
            transaction_id: payment.transaction_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub payment: PaymentResponse,
    pub invoice: InvoiceTotalsResponse,
}
