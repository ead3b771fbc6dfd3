//! Payment recording handler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::items::InvoiceTotalsResponse,
    dtos::payments::{PaymentResponse, RecordPaymentRequest, RecordPaymentResponse},
    middleware::AuthContext,
    services::metrics::PAYMENTS_TOTAL,
    AppState,
};

/// Record a payment against an invoice. The full write (payment row,
/// audit row, invoice balance/status) is atomic in the store.
pub async fn record_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    payload.validate()?;

    let invoice = state
        .db
        .get_invoice(auth.tenant_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    auth.authorize_customer(invoice.customer_id)?;

    tracing::info!(
        invoice_id = %invoice_id,
        tenant_id = %auth.tenant_id,
        amount = %payload.amount,
        payment_method = %payload.payment_method,
        "Recording payment"
    );

    let input = payload.into_input(auth.tenant_id, invoice_id);
    let (payment, invoice) = state.db.record_payment(&input).await?;

    PAYMENTS_TOTAL
        .with_label_values(&[payment.payment_method.as_str()])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse {
            payment: PaymentResponse::from(payment),
            invoice: InvoiceTotalsResponse::from(&invoice),
        }),
    ))
}
