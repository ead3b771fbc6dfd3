//! Line item request/response DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{CreateLineItem, Invoice, LineItem, UpdateLineItem};

pub fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

/// Tax rates are fractional (0.15 = 15%), not percentages.
pub fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE {
        return Err(ValidationError::new("tax_rate_out_of_range"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLineItemRequest {
    pub chargeable_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: String,
    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,
    #[validate(custom(function = "validate_non_negative"))]
    pub unit_price: Decimal,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
}

impl CreateLineItemRequest {
    pub fn into_input(self, tenant_id: Uuid, invoice_id: Uuid) -> CreateLineItem {
        CreateLineItem {
            tenant_id,
            invoice_id,
            chargeable_id: self.chargeable_id,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLineItemRequest {
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_positive"))]
    pub quantity: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    pub unit_price: Option<Decimal>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
}

impl UpdateLineItemRequest {
    pub fn into_input(self) -> UpdateLineItem {
        UpdateLineItem {
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub chargeable_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
    pub amount: Decimal,
    pub tax_amount: Decimal,
    pub rate_inclusive: Decimal,
    pub total: Decimal,
    pub created_utc: DateTime<Utc>,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            line_item_id: item.line_item_id,
            invoice_id: item.invoice_id,
            chargeable_id: item.chargeable_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: item.tax_rate,
            amount: item.amount,
            tax_amount: item.tax_amount,
            rate_inclusive: item.rate_inclusive,
            total: item.total,
            created_utc: item.created_utc,
        }
    }
}

/// Invoice totals echoed back after any item mutation, so the caller
/// always sees the recomputed aggregates without a second fetch.
#[derive(Debug, Serialize)]
pub struct InvoiceTotalsResponse {
    pub invoice_id: Uuid,
    pub status: String,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
}

impl From<&Invoice> for InvoiceTotalsResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            status: invoice.status.clone(),
            subtotal: invoice.subtotal,
            tax_total: invoice.tax_total,
            total: invoice.total,
            amount_paid: invoice.amount_paid,
            amount_due: invoice.amount_due,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemListResponse {
    pub line_items: Vec<LineItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct LineItemMutationResponse {
    pub line_item: LineItemResponse,
    pub invoice: InvoiceTotalsResponse,
}

#[derive(Debug, Serialize)]
pub struct LineItemRemovalResponse {
    pub invoice: InvoiceTotalsResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_create() -> CreateLineItemRequest {
        CreateLineItemRequest {
            chargeable_id: None,
            description: "Support hours".to_string(),
            quantity: dec!(2),
            unit_price: dec!(45.50),
            tax_rate: Some(dec!(0.15)),
        }
    }

    #[test]
    fn accepts_a_well_formed_item() {
        assert!(valid_create().validate().is_ok());
    }

    #[test]
    fn rejects_zero_or_negative_quantity() {
        let mut request = valid_create();
        request.quantity = dec!(0);
        assert!(request.validate().is_err());
        request.quantity = dec!(-1);
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_negative_unit_price_but_allows_zero() {
        let mut request = valid_create();
        request.unit_price = dec!(0);
        assert!(request.validate().is_ok());
        request.unit_price = dec!(-0.01);
        assert!(request.validate().is_err());
    }

    #[test]
    fn tax_rate_is_a_fraction_between_zero_and_one() {
        let mut request = valid_create();
        request.tax_rate = Some(dec!(1));
        assert!(request.validate().is_ok());
        request.tax_rate = Some(dec!(1.01));
        assert!(request.validate().is_err());
        request.tax_rate = Some(dec!(-0.05));
        assert!(request.validate().is_err());
    }

    #[test]
    fn partial_update_validates_only_present_fields() {
        let request = UpdateLineItemRequest {
            description: None,
            quantity: Some(dec!(3)),
            unit_price: None,
            tax_rate: None,
        };
        assert!(request.validate().is_ok());

        let request = UpdateLineItemRequest {
            description: Some(String::new()),
            quantity: None,
            unit_price: None,
            tax_rate: None,
        };
        assert!(request.validate().is_err());
    }
}
