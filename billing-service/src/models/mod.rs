//! Domain models for billing-service.

mod credit_transaction;
mod invoice;
mod line_item;
mod payment;

pub use credit_transaction::{CreditTransaction, CreditTransactionType};
pub use invoice::{Invoice, InvoiceStatus};
pub use line_item::{CreateLineItem, LineItem, UpdateLineItem};
pub use payment::{Payment, PaymentAudit, RecordPayment};
