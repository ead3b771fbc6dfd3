//! Customer statement handler.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::statements::{StatementQuery, StatementResponse},
    middleware::AuthContext,
    services::metrics::STATEMENTS_TOTAL,
    services::statement::build_statement,
    AppState,
};

/// Generate a customer statement for an optional date window.
///
/// Merges invoices, payments and surviving legacy credits into one
/// chronological entry list with a running balance. The outstanding
/// balance is computed over all currently-owed invoices regardless of
/// the requested window.
pub async fn get_statement(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<StatementQuery>,
) -> Result<Json<StatementResponse>, AppError> {
    auth.authorize_customer(customer_id)?;

    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "start_date must not be after end_date"
            )));
        }
    }

    tracing::info!(
        customer_id = %customer_id,
        tenant_id = %auth.tenant_id,
        start_date = ?query.start_date,
        end_date = ?query.end_date,
        "Generating statement"
    );

    let invoices = state
        .db
        .get_invoices_for_statement(auth.tenant_id, customer_id, query.start_date, query.end_date)
        .await?;
    let payments = state
        .db
        .get_payments_for_statement(auth.tenant_id, customer_id, query.start_date, query.end_date)
        .await?;
    let credits = state
        .db
        .get_credits_for_statement(auth.tenant_id, customer_id, query.start_date, query.end_date)
        .await?;

    let payment_invoice_ids: Vec<Uuid> = payments.iter().map(|p| p.invoice_id).collect();
    let invoice_numbers = state
        .db
        .get_invoice_references(auth.tenant_id, &payment_invoice_ids)
        .await?;

    let outstanding = state
        .db
        .outstanding_balance(auth.tenant_id, customer_id)
        .await?;

    let statement = build_statement(&invoices, &payments, &credits, &invoice_numbers, outstanding);

    STATEMENTS_TOTAL.with_label_values(&["generated"]).inc();

    Ok(Json(StatementResponse::from_statement(
        customer_id,
        query.start_date,
        query.end_date,
        statement,
    )))
}
