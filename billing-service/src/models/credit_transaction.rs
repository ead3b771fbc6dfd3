//! Legacy credit transaction model.
//!
//! Historical customer credits recorded before the dedicated payment
//! table existed. This engine never writes them; they are merged into
//! statements unless a payment already re-records them via
//! `Payment::transaction_id`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionType {
    Credit,
    Adjustment,
}

impl CreditTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditTransactionType::Credit => "credit",
            CreditTransactionType::Adjustment => "adjustment",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "adjustment" => CreditTransactionType::Adjustment,
            _ => CreditTransactionType::Credit,
        }
    }
}

/// Historical credit record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransaction {
    pub transaction_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub txn_type: String,
    pub status: String,
    pub completed_utc: Option<DateTime<Utc>>,
    /// Tagging metadata; `category = "payment_credit"` marks the
    /// record as a historical payment credit, `description` feeds the
    /// statement text.
    pub metadata: Option<serde_json::Value>,
}

impl CreditTransaction {
    /// Statement description from metadata, with a generic fallback.
    pub fn description(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("description"))
            .and_then(|d| d.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Account credit".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn type_round_trips_with_credit_fallback() {
        assert_eq!(
            CreditTransactionType::from_string("adjustment"),
            CreditTransactionType::Adjustment
        );
        assert_eq!(
            CreditTransactionType::from_string("anything-else"),
            CreditTransactionType::Credit
        );
        assert_eq!(CreditTransactionType::Credit.as_str(), "credit");
    }

    #[test]
    fn description_prefers_metadata_over_fallback() {
        let mut credit = CreditTransaction {
            transaction_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount: dec!(10.00),
            txn_type: CreditTransactionType::Credit.as_str().to_string(),
            status: "completed".to_string(),
            completed_utc: None,
            metadata: Some(serde_json::json!({ "description": "Referral bonus" })),
        };
        assert_eq!(credit.description(), "Referral bonus");

        credit.metadata = None;
        assert_eq!(credit.description(), "Account credit");
    }
}
