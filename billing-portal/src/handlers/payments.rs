//! Payment handlers.
//!
//! Submission comes from the user portal; validation, rejection and
//! application are admin actions driving the payment state machine.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use portal_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    ApplyPaymentResponse, ListPaymentsQuery, Paginated, PaymentDetailResponse,
    RejectPaymentRequest, SubmitPaymentRequest, SubmitPaymentResponse,
};
use crate::middleware::AdminContext;
use crate::models::{AdminPaymentRow, AllocationInput, Payment, SubmitPayment};
use crate::startup::AppState;

/// Submit a payment against one or more invoices.
pub async fn submit_payment(
    State(state): State<AppState>,
    Json(payload): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<SubmitPaymentResponse>), AppError> {
    payload.validate()?;

    let server = state
        .db
        .get_server_by_name(&payload.domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    let input = SubmitPayment {
        allocations: payload
            .allocations
            .iter()
            .map(|a| AllocationInput {
                invoice_id: a.invoice_id,
                amount_cents: a.amount_cents,
            })
            .collect(),
        amount_cents: payload.amount_cents,
        method: payload.method,
        bank: payload.bank,
        proof_ref: payload.proof_ref,
        submitted_by: payload.submitted_by,
    };

    let payment = state.db.submit_payment(&server, &input).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitPaymentResponse {
            payment_id: payment.payment_id,
        }),
    ))
}

/// Mark a pending payment as validated.
pub async fn validate_payment(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.db.validate_payment(payment_id, admin.admin_id).await?;

    Ok(Json(payment))
}

/// Reject a pending payment with a reason.
pub async fn reject_payment(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<RejectPaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    payload.validate()?;

    let payment = state
        .db
        .reject_payment(payment_id, admin.admin_id, &payload.reason)
        .await?;

    Ok(Json(payment))
}

/// Apply a validated payment to its allocated invoices.
pub async fn apply_payment(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApplyPaymentResponse>, AppError> {
    let (payment, _) = state
        .db
        .apply_payment(payment_id, admin.admin_id, Utc::now().date_naive())
        .await?;

    Ok(Json(ApplyPaymentResponse {
        message: "Payment applied".to_string(),
        payment_id: payment.payment_id,
    }))
}

/// Get a payment together with its allocation breakdown.
pub async fn get_payment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentDetailResponse>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    let allocations = state.db.list_allocations(payment_id).await?;

    Ok(Json(PaymentDetailResponse {
        payment,
        allocations,
    }))
}

/// Paginated admin payment listing.
pub async fn list_payments_admin(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Paginated<AdminPaymentRow>>, AppError> {
    let filter = query.into_filter();
    let (rows, total) = state.db.list_payments_admin(&filter).await?;

    Ok(Json(Paginated::new(rows, total, filter.page, filter.limit)))
}
