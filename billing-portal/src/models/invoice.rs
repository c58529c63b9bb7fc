//! Invoice model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status. Always a pure function of the outstanding balance, never
/// set independently of it (see [`InvoiceStatus::for_balance`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => InvoiceStatus::Partial,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Unpaid,
        }
    }

    /// The status an invoice must carry for a given balance.
    pub fn for_balance(balance_cents: i64, total_cents: i64) -> Self {
        if balance_cents <= 0 {
            InvoiceStatus::Paid
        } else if balance_cents < total_cents {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

/// Invoice record. Balances are integer minor-currency units (cents).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub server_id: Uuid,
    pub folio: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_cents: i64,
    pub balance_cents: i64,
    pub status: String,
    pub pdf_ref: Option<String>,
    pub xml_ref: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Invoice row joined with its server's domain, for admin listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminInvoiceRow {
    pub invoice_id: Uuid,
    pub folio: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_cents: i64,
    pub balance_cents: i64,
    pub status: String,
    pub pdf_ref: Option<String>,
    pub xml_ref: Option<String>,
    pub domain: String,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub folio: String,
    pub issue_date: NaiveDate,
    pub total_cents: i64,
    pub pdf_ref: Option<String>,
    pub xml_ref: Option<String>,
}

/// Sortable columns for the admin invoice listing. Only these columns may
/// appear in an ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSortColumn {
    IssueDate,
    #[default]
    DueDate,
    TotalCents,
}

impl InvoiceSortColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            InvoiceSortColumn::IssueDate => "i.issue_date",
            InvoiceSortColumn::DueDate => "i.due_date",
            InvoiceSortColumn::TotalCents => "i.total_cents",
        }
    }
}

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Filter parameters for the admin invoice listing.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub order_by: InvoiceSortColumn,
    pub order: SortDirection,
    pub page: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_pure_function_of_balance() {
        assert_eq!(InvoiceStatus::for_balance(150000, 150000), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::for_balance(50000, 150000), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::for_balance(1, 150000), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::for_balance(0, 150000), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::for_balance(-100, 150000), InvoiceStatus::Paid);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [InvoiceStatus::Unpaid, InvoiceStatus::Partial, InvoiceStatus::Paid] {
            assert_eq!(InvoiceStatus::from_string(status.as_str()), status);
        }
    }
}
