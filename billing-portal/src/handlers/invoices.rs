//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use portal_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateInvoiceRequest, CreateInvoiceResponse, ListInvoicesQuery, Paginated};
use crate::middleware::AdminContext;
use crate::models::{AdminInvoiceRow, CreateInvoice, Invoice};
use crate::startup::AppState;

/// Create an invoice for a server and immediately refresh its announcements.
pub async fn create_invoice(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<CreateInvoiceResponse>), AppError> {
    payload.validate()?;

    let server = state
        .db
        .get_server_by_name(&payload.domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    tracing::info!(
        admin_id = %admin.admin_id,
        domain = %server.name,
        folio = %payload.folio,
        total_cents = payload.total_cents,
        "Creating invoice"
    );

    let input = CreateInvoice {
        folio: payload.folio,
        issue_date: payload.issue_date,
        total_cents: payload.total_cents,
        pdf_ref: payload.pdf_ref,
        xml_ref: payload.xml_ref,
    };

    let invoice = state
        .db
        .create_invoice(
            &server,
            &input,
            state.config.dunning.due_offset_days,
            Utc::now().date_naive(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInvoiceResponse {
            invoice_id: invoice.invoice_id,
            folio: invoice.folio,
            message: "Invoice created".to_string(),
        }),
    ))
}

/// Paginated admin invoice listing.
pub async fn list_invoices_admin(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Paginated<AdminInvoiceRow>>, AppError> {
    let filter = query.into_filter();
    let (rows, total) = state.db.list_invoices_admin(&filter).await?;

    Ok(Json(Paginated::new(rows, total, filter.page, filter.limit)))
}

/// User portal view: a server's invoices with outstanding balance.
pub async fn list_server_invoices(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let server = state
        .db
        .get_server_by_name(&domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    let invoices = state.db.list_open_invoices(server.server_id).await?;

    Ok(Json(invoices))
}
