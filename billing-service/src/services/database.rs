//! Database service for billing-service.
//!
//! All invoice-mutating paths (line item lifecycle, payment recording)
//! run inside a transaction that locks the invoice row `FOR UPDATE`,
//! so concurrent mutations of one invoice serialize and no caller can
//! act on a stale balance. Every failure before commit rolls the whole
//! unit back.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CreateLineItem, CreditTransaction, Invoice, Payment, PaymentAudit, RecordPayment, LineItem,
    UpdateLineItem,
};
use crate::services::amounts::{invoice_totals, line_amounts};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::payments::{apply_payment, validate_payment};

const INVOICE_COLUMNS: &str = "invoice_id, tenant_id, customer_id, invoice_number, status, \
     issue_date, due_date, tax_rate, subtotal, tax_total, total, amount_paid, amount_due, \
     notes, created_utc, deleted_utc";

const LINE_ITEM_COLUMNS: &str = "line_item_id, invoice_id, tenant_id, chargeable_id, \
     description, quantity, unit_price, tax_rate, amount, tax_amount, rate_inclusive, total, \
     created_utc, deleted_utc";

const PAYMENT_COLUMNS: &str = "payment_id, tenant_id, invoice_id, customer_id, amount, \
     payment_method, payment_reference, notes, paid_utc, transaction_id, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Reads
    // -------------------------------------------------------------------------

    /// Get a non-deleted invoice by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            "#,
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Line Item Operations
    // -------------------------------------------------------------------------

    /// Get non-deleted line items for an invoice in creation order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    pub async fn get_line_items(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM line_items
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            ORDER BY created_utc
            "#,
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    /// Add a line item to a draft invoice and recompute invoice totals,
    /// as one atomic unit.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, invoice_id = %input.invoice_id))]
    pub async fn add_line_item(
        &self,
        input: &CreateLineItem,
    ) -> Result<(LineItem, Invoice), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_line_item"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = Self::lock_invoice(&mut tx, input.tenant_id, input.invoice_id).await?;
        Self::require_draft(&invoice)?;

        // Item tax rate overrides the invoice default.
        let effective_rate = input.tax_rate.unwrap_or(invoice.tax_rate);
        let amounts = line_amounts(input.quantity, input.unit_price, effective_rate);

        let line_item_id = Uuid::new_v4();
        let line_item = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            INSERT INTO line_items (
                line_item_id, invoice_id, tenant_id, chargeable_id, description,
                quantity, unit_price, tax_rate, amount, tax_amount, rate_inclusive, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {LINE_ITEM_COLUMNS}
            "#,
        ))
        .bind(line_item_id)
        .bind(input.invoice_id)
        .bind(input.tenant_id)
        .bind(input.chargeable_id)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(input.tax_rate)
        .bind(amounts.amount)
        .bind(amounts.tax_amount)
        .bind(amounts.rate_inclusive)
        .bind(amounts.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add line item: {}", e)))?;

        let invoice = Self::write_invoice_totals(&mut tx, &invoice).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item: {}", e))
        })?;

        timer.observe_duration();

        info!(line_item_id = %line_item.line_item_id, "Line item added");

        Ok((line_item, invoice))
    }

    /// Update a line item on a draft invoice, recomputing derived
    /// amounts and invoice totals atomically. Returns None when the
    /// item does not exist.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn update_line_item(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_item_id: Uuid,
        input: &UpdateLineItem,
    ) -> Result<Option<(LineItem, Invoice)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_line_item"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = Self::lock_invoice(&mut tx, tenant_id, invoice_id).await?;
        Self::require_draft(&invoice)?;

        let existing = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM line_items
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_item_id = $3
              AND deleted_utc IS NULL
            "#,
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line item: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        // Merge partial fields with stored values, then re-derive.
        let description = input
            .description
            .clone()
            .unwrap_or_else(|| existing.description.clone());
        let quantity = input.quantity.unwrap_or(existing.quantity);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let tax_rate = input.tax_rate.or(existing.tax_rate);
        let effective_rate = tax_rate.unwrap_or(invoice.tax_rate);
        let amounts = line_amounts(quantity, unit_price, effective_rate);

        let line_item = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            UPDATE line_items
            SET description = $4,
                quantity = $5,
                unit_price = $6,
                tax_rate = $7,
                amount = $8,
                tax_amount = $9,
                rate_inclusive = $10,
                total = $11
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_item_id = $3
            RETURNING {LINE_ITEM_COLUMNS}
            "#,
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_item_id)
        .bind(&description)
        .bind(quantity)
        .bind(unit_price)
        .bind(tax_rate)
        .bind(amounts.amount)
        .bind(amounts.tax_amount)
        .bind(amounts.rate_inclusive)
        .bind(amounts.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update line item: {}", e))
        })?;

        let invoice = Self::write_invoice_totals(&mut tx, &invoice).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item update: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some((line_item, invoice)))
    }

    /// Soft-delete a line item on a draft invoice and recompute invoice
    /// totals. Returns the updated invoice, or None when the item does
    /// not exist.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn remove_line_item(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line_item_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_line_item"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = Self::lock_invoice(&mut tx, tenant_id, invoice_id).await?;
        Self::require_draft(&invoice)?;

        let result = sqlx::query(
            r#"
            UPDATE line_items
            SET deleted_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2 AND line_item_id = $3
              AND deleted_utc IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line_item_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to remove line item: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let invoice = Self::write_invoice_totals(&mut tx, &invoice).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item removal: {}", e))
        })?;

        timer.observe_duration();

        info!(line_item_id = %line_item_id, "Line item removed");

        Ok(Some(invoice))
    }

    // -------------------------------------------------------------------------
    // Payment Recording
    // -------------------------------------------------------------------------

    /// Record a payment against an invoice: insert the payment, write
    /// the audit row, and update the invoice balance/status as one
    /// atomic unit. The invoice row is locked for the duration, so two
    /// concurrent recorders cannot both read the same balance and
    /// jointly overpay.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        input: &RecordPayment,
    ) -> Result<(Payment, Invoice), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.begin().await?;

        // Lock including soft-deleted rows; the guard classifies those
        // as NotFound rather than leaking their state.
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2
            FOR UPDATE
            "#,
        ))
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        validate_payment(&invoice, input.amount)?;
        let outcome = apply_payment(&invoice, input.amount);

        let paid_utc = input.paid_utc.unwrap_or_else(chrono::Utc::now);
        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_id, tenant_id, invoice_id, customer_id, amount,
                payment_method, payment_reference, notes, paid_utc, transaction_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PAYMENT_COLUMNS}
            "#,
        ))
        .bind(payment_id)
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .bind(invoice.customer_id)
        .bind(input.amount)
        .bind(&input.payment_method)
        .bind(&input.payment_reference)
        .bind(&input.notes)
        .bind(paid_utc)
        .bind(input.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        let audit = sqlx::query_as::<_, PaymentAudit>(
            r#"
            INSERT INTO payment_audit (audit_id, tenant_id, invoice_id, payment_id, amount, balance_after)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING audit_id, tenant_id, invoice_id, payment_id, amount, balance_after, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .bind(payment_id)
        .bind(input.amount)
        .bind(outcome.amount_due)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment audit: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET amount_paid = $3,
                amount_due = $4,
                status = $5
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(input.tenant_id)
        .bind(input.invoice_id)
        .bind(outcome.amount_paid)
        .bind(outcome.amount_due)
        .bind(outcome.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            audit_id = %audit.audit_id,
            amount = %payment.amount,
            amount_due = %invoice.amount_due,
            status = %invoice.status,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    // -------------------------------------------------------------------------
    // Statement Queries
    // -------------------------------------------------------------------------

    /// Get statement-visible invoices for a customer, optionally
    /// bounded by issue date.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn get_invoices_for_statement(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoices_for_statement"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE tenant_id = $1
              AND customer_id = $2
              AND deleted_utc IS NULL
              AND status IN ('pending', 'overdue', 'paid', 'refunded')
              AND ($3::date IS NULL OR issue_date >= $3)
              AND ($4::date IS NULL OR issue_date <= $4)
            ORDER BY issue_date, invoice_number
            "#,
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoices for statement: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Get a customer's payments, optionally bounded by payment date.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn get_payments_for_statement(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payments_for_statement"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE tenant_id = $1
              AND customer_id = $2
              AND ($3::date IS NULL OR paid_utc::date >= $3)
              AND ($4::date IS NULL OR paid_utc::date <= $4)
            ORDER BY paid_utc
            "#,
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get payments for statement: {}", e))
        })?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Get a customer's completed legacy payment credits, optionally
    /// bounded by completion date. Exclusion of credits already
    /// re-recorded as payments happens in the reconciler.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn get_credits_for_statement(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CreditTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_credits_for_statement"])
            .start_timer();

        let credits = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT transaction_id, tenant_id, customer_id, amount, txn_type, status,
                completed_utc, metadata
            FROM credit_transactions
            WHERE tenant_id = $1
              AND customer_id = $2
              AND status = 'completed'
              AND txn_type IN ('credit', 'adjustment')
              AND metadata ->> 'category' = 'payment_credit'
              AND ($3::date IS NULL OR completed_utc::date >= $3)
              AND ($4::date IS NULL OR completed_utc::date <= $4)
            ORDER BY completed_utc
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get credits for statement: {}", e))
        })?;

        timer.observe_duration();

        Ok(credits)
    }

    /// Resolve invoice display references for payment descriptions.
    /// Missing ids simply stay unresolved; the reconciler degrades the
    /// description text instead of failing.
    #[instrument(skip(self, invoice_ids), fields(tenant_id = %tenant_id))]
    pub async fn get_invoice_references(
        &self,
        tenant_id: Uuid,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        if invoice_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_references"])
            .start_timer();

        let rows: Vec<(Uuid, Option<String>)> = sqlx::query_as(
            r#"
            SELECT invoice_id, invoice_number
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = ANY($2)
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice references: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows
            .into_iter()
            .map(|(id, number)| (id, number.unwrap_or_else(|| id.to_string())))
            .collect())
    }

    /// Sum of amount_due over the customer's live pending/overdue
    /// invoices. Deliberately ignores any statement date window: this
    /// is what the customer owes right now.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn outstanding_balance(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["outstanding_balance"])
            .start_timer();

        let outstanding: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_due), 0)
            FROM invoices
            WHERE tenant_id = $1
              AND customer_id = $2
              AND deleted_utc IS NULL
              AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute outstanding balance: {}", e))
        })?;

        timer.observe_duration();

        Ok(outstanding.unwrap_or(Decimal::ZERO))
    }

    // -------------------------------------------------------------------------
    // Transaction helpers
    // -------------------------------------------------------------------------

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }

    /// Lock the invoice row for the remainder of the transaction.
    async fn lock_invoice(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }

    fn require_draft(invoice: &Invoice) -> Result<(), AppError> {
        if invoice.status != "draft" {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Line items can only be modified on draft invoices"
            )));
        }
        Ok(())
    }

    /// Recompute invoice totals from the current live item set (inside
    /// the caller's transaction, invoice row already locked) and write
    /// them back.
    async fn write_invoice_totals(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &Invoice,
    ) -> Result<Invoice, AppError> {
        let items = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM line_items
            WHERE tenant_id = $1 AND invoice_id = $2 AND deleted_utc IS NULL
            ORDER BY created_utc
            "#,
        ))
        .bind(invoice.tenant_id)
        .bind(invoice.invoice_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reload line items: {}", e))
        })?;

        let totals = invoice_totals(&items, invoice.amount_paid);

        sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET subtotal = $3,
                tax_total = $4,
                total = $5,
                amount_due = $6
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice.tenant_id)
        .bind(invoice.invoice_id)
        .bind(totals.subtotal)
        .bind(totals.tax_total)
        .bind(totals.total)
        .bind(totals.amount_due)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to write invoice totals: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn invoice_in(status: &str) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_number: Some("INV-3001".to_string()),
            status: status.to_string(),
            issue_date: None,
            due_date: None,
            tax_rate: dec!(0.15),
            subtotal: dec!(100.00),
            tax_total: dec!(15.00),
            total: dec!(115.00),
            amount_paid: Decimal::ZERO,
            amount_due: dec!(115.00),
            notes: None,
            created_utc: Utc::now(),
            deleted_utc: None,
        }
    }

    #[test]
    fn draft_invoices_accept_item_mutations() {
        assert!(Database::require_draft(&invoice_in("draft")).is_ok());
    }

    #[test]
    fn every_non_draft_status_blocks_item_mutations() {
        for status in ["pending", "overdue", "paid", "cancelled", "refunded"] {
            let err = Database::require_draft(&invoice_in(status)).unwrap_err();
            assert!(
                matches!(err, AppError::InvalidState(_)),
                "status {status} must be InvalidState"
            );
        }
    }
}
