//! Payment model and allocation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::invoice::SortDirection;

/// Payment lifecycle status.
///
/// `pending → validated → applied` with `applied` terminal; `rejected` is a
/// terminal state reachable only from `pending`. Every transition is enforced
/// with a status-guarded update in the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Validated,
    Applied,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Validated => "validated",
            PaymentStatus::Applied => "applied",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "validated" => PaymentStatus::Validated,
            "applied" => PaymentStatus::Applied,
            "rejected" => PaymentStatus::Rejected,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Payment record. The allocation breakdown lives in `payment_allocations`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub server_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub bank: Option<String>,
    pub status: String,
    pub proof_ref: String,
    pub validated_by: Option<Uuid>,
    pub validated_utc: Option<DateTime<Utc>>,
    pub applied_by: Option<Uuid>,
    pub applied_utc: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_utc: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// A portion of a payment applied to one invoice's balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAllocation {
    pub allocation_id: Uuid,
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount_cents: i64,
}

/// Payment row joined with its server's domain, for admin listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminPaymentRow {
    pub payment_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    pub bank: Option<String>,
    pub status: String,
    pub proof_ref: String,
    pub created_utc: DateTime<Utc>,
    pub domain: String,
}

/// One requested allocation at submission time.
#[derive(Debug, Clone)]
pub struct AllocationInput {
    pub invoice_id: Uuid,
    pub amount_cents: i64,
}

/// Input for submitting a payment.
#[derive(Debug, Clone)]
pub struct SubmitPayment {
    pub allocations: Vec<AllocationInput>,
    pub amount_cents: i64,
    pub method: String,
    pub bank: Option<String>,
    pub proof_ref: String,
    pub submitted_by: Option<Uuid>,
}

/// Sortable columns for the admin payment listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSortColumn {
    #[default]
    CreatedUtc,
    AmountCents,
}

impl PaymentSortColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            PaymentSortColumn::CreatedUtc => "p.created_utc",
            PaymentSortColumn::AmountCents => "p.amount_cents",
        }
    }
}

/// Filter parameters for the admin payment listing.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
    pub order_by: PaymentSortColumn,
    pub order: SortDirection,
    pub page: i64,
    pub limit: i64,
}
