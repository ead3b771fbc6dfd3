//! Invoice line item handlers.
//!
//! All operations are scoped to the caller's tenant. Reads are open to
//! staff and the invoice's own customer; mutations additionally require
//! the invoice to be in draft, which the database layer enforces under
//! the invoice row lock.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::items::{
        CreateLineItemRequest, InvoiceTotalsResponse, LineItemListResponse,
        LineItemMutationResponse, LineItemRemovalResponse, LineItemResponse,
        UpdateLineItemRequest,
    },
    middleware::AuthContext,
    models::Invoice,
    AppState,
};

async fn authorized_invoice(
    state: &AppState,
    auth: &AuthContext,
    invoice_id: Uuid,
) -> Result<Invoice, AppError> {
    let invoice = state
        .db
        .get_invoice(auth.tenant_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    auth.authorize_customer(invoice.customer_id)?;
    Ok(invoice)
}

/// List the non-deleted line items of an invoice.
pub async fn get_line_items(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<LineItemListResponse>, AppError> {
    authorized_invoice(&state, &auth, invoice_id).await?;

    let line_items = state.db.get_line_items(auth.tenant_id, invoice_id).await?;

    Ok(Json(LineItemListResponse {
        line_items: line_items.into_iter().map(LineItemResponse::from).collect(),
    }))
}

/// Add a line item to a draft invoice.
pub async fn create_line_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<CreateLineItemRequest>,
) -> Result<(StatusCode, Json<LineItemMutationResponse>), AppError> {
    payload.validate()?;
    authorized_invoice(&state, &auth, invoice_id).await?;

    tracing::info!(
        invoice_id = %invoice_id,
        tenant_id = %auth.tenant_id,
        "Adding line item"
    );

    let input = payload.into_input(auth.tenant_id, invoice_id);
    let (line_item, invoice) = state.db.add_line_item(&input).await?;

    Ok((
        StatusCode::CREATED,
        Json(LineItemMutationResponse {
            line_item: LineItemResponse::from(line_item),
            invoice: InvoiceTotalsResponse::from(&invoice),
        }),
    ))
}

/// Update a line item on a draft invoice.
pub async fn update_line_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((invoice_id, line_item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateLineItemRequest>,
) -> Result<Json<LineItemMutationResponse>, AppError> {
    payload.validate()?;
    authorized_invoice(&state, &auth, invoice_id).await?;

    tracing::info!(
        invoice_id = %invoice_id,
        line_item_id = %line_item_id,
        tenant_id = %auth.tenant_id,
        "Updating line item"
    );

    let (line_item, invoice) = state
        .db
        .update_line_item(auth.tenant_id, invoice_id, line_item_id, &payload.into_input())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;

    Ok(Json(LineItemMutationResponse {
        line_item: LineItemResponse::from(line_item),
        invoice: InvoiceTotalsResponse::from(&invoice),
    }))
}

/// Soft-delete a line item on a draft invoice.
pub async fn delete_line_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((invoice_id, line_item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LineItemRemovalResponse>, AppError> {
    authorized_invoice(&state, &auth, invoice_id).await?;

    tracing::info!(
        invoice_id = %invoice_id,
        line_item_id = %line_item_id,
        tenant_id = %auth.tenant_id,
        "Removing line item"
    );

    let invoice = state
        .db
        .remove_line_item(auth.tenant_id, invoice_id, line_item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;

    Ok(Json(LineItemRemovalResponse {
        invoice: InvoiceTotalsResponse::from(&invoice),
    }))
}
