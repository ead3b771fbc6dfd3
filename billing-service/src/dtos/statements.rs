//! Statement request/response DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::statement::{Statement, StatementEntry};

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct StatementEntryResponse {
    pub entry_id: Uuid,
    pub entry_type: String,
    pub date: DateTime<Utc>,
    pub reference: String,
    pub description: String,
    pub amount: Decimal,
    pub balance: Decimal,
}

impl From<StatementEntry> for StatementEntryResponse {
    fn from(entry: StatementEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            entry_type: entry.entry_type.as_str().to_string(),
            date: entry.date,
            reference: entry.reference,
            description: entry.description,
            amount: entry.amount,
            balance: entry.balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatementResponse {
    pub customer_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub outstanding_balance: Decimal,
    pub entries: Vec<StatementEntryResponse>,
}

impl StatementResponse {
    pub fn from_statement(
        customer_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        statement: Statement,
    ) -> Self {
        Self {
            customer_id,
            start_date,
            end_date,
            opening_balance: statement.opening_balance,
            closing_balance: statement.closing_balance,
            outstanding_balance: statement.outstanding_balance,
            entries: statement.entries.into_iter().map(Into::into).collect(),
        }
    }
}
