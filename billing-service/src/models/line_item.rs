//! Line item model for billing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice.
///
/// `amount`, `tax_amount`, `rate_inclusive` and `total` are derived by
/// the amount calculator and never written directly by callers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    /// Optional reference to the external billable resource this line
    /// charges for.
    pub chargeable_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Tax fraction override; `None` falls back to the invoice default.
    pub tax_rate: Option<Decimal>,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    /// Display unit price including tax.
    pub rate_inclusive: Decimal,
    pub total: Decimal,
    pub created_utc: DateTime<Utc>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

impl LineItem {
    pub fn is_deleted(&self) -> bool {
        self.deleted_utc.is_some()
    }
}

/// Input for creating a line item.
#[derive(Debug, Clone)]
pub struct CreateLineItem {
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub chargeable_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
}

/// Input for updating a line item (partial; unset fields keep their
/// stored values).
#[derive(Debug, Clone, Default)]
pub struct UpdateLineItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
}
