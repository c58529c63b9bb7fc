//! Request and response types for the HTTP surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    AnnouncementKind, InvoiceSortColumn, InvoiceStatus, ListAlertsFilter, ListInvoicesFilter,
    ListPaymentsFilter, Payment, PaymentAllocation, PaymentSortColumn, PaymentStatus,
    SortDirection,
};
use crate::services::reconciliation::DunningState;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// Generic paginated listing envelope.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            data,
            total,
            page,
            limit,
            pages,
        }
    }
}

// -----------------------------------------------------------------------------
// Servers
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServerRequest {
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    /// Defaults to the service-wide grace period when omitted.
    #[validate(range(min = 1, max = 90))]
    pub grace_days: Option<i32>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    #[validate(length(min = 1, max = 64))]
    pub folio: String,
    pub issue_date: NaiveDate,
    #[validate(range(min = 1))]
    pub total_cents: i64,
    pub pdf_ref: Option<String>,
    pub xml_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateInvoiceResponse {
    pub invoice_id: Uuid,
    pub folio: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListInvoicesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub order_by: Option<InvoiceSortColumn>,
    pub order: Option<SortDirection>,
}

impl ListInvoicesQuery {
    pub fn into_filter(self) -> ListInvoicesFilter {
        ListInvoicesFilter {
            search: self.search,
            status: self.status,
            order_by: self.order_by.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100),
        }
    }
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AllocationRequest {
    pub invoice_id: Uuid,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    #[validate(length(min = 1), nested)]
    pub allocations: Vec<AllocationRequest>,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    #[validate(length(min = 1, max = 64))]
    pub method: String,
    pub bank: Option<String>,
    #[validate(length(min = 1))]
    pub proof_ref: String,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubmitPaymentResponse {
    pub payment_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectPaymentRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ApplyPaymentResponse {
    pub message: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentDetailResponse {
    pub payment: Payment,
    pub allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListPaymentsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
    pub order_by: Option<PaymentSortColumn>,
    pub order: Option<SortDirection>,
}

impl ListPaymentsQuery {
    pub fn into_filter(self) -> ListPaymentsFilter {
        ListPaymentsFilter {
            search: self.search,
            status: self.status,
            order_by: self.order_by.unwrap_or_default(),
            order: self.order.unwrap_or(SortDirection::Desc),
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100),
        }
    }
}

// -----------------------------------------------------------------------------
// Announcements
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    pub kind: AnnouncementKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub body: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateAnnouncementRequest {
    pub kind: Option<AnnouncementKind>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub body: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub due_soon: bool,
    pub overdue: bool,
    pub suspend: bool,
    pub message: String,
}

impl RegenerateResponse {
    pub fn from_state(state: DunningState) -> Self {
        let message = if state.is_clear() {
            "Balance settled, announcements archived".to_string()
        } else {
            "Announcements regenerated".to_string()
        };
        Self {
            due_soon: state.due_soon,
            overdue: state.overdue,
            suspend: state.suspend,
            message,
        }
    }
}

// -----------------------------------------------------------------------------
// Alerts
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct ListAlertsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub q: Option<String>,
}

impl ListAlertsQuery {
    pub fn into_filter(self) -> ListAlertsFilter {
        ListAlertsFilter {
            alert_type: self.alert_type,
            search: self.q,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 200),
        }
    }
}
