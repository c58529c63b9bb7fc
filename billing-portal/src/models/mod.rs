//! Domain models for the billing portal.

pub mod alert;
pub mod announcement;
pub mod invoice;
pub mod payment;
pub mod server;

pub use alert::{AdminAlertRow, Alert, ListAlertsFilter};
pub use announcement::{
    Announcement, AnnouncementKind, AnnouncementStatus, CreateAnnouncement, UpdateAnnouncement,
};
pub use invoice::{
    AdminInvoiceRow, CreateInvoice, Invoice, InvoiceSortColumn, InvoiceStatus, ListInvoicesFilter,
    SortDirection,
};
pub use payment::{
    AdminPaymentRow, AllocationInput, ListPaymentsFilter, Payment, PaymentAllocation,
    PaymentSortColumn, PaymentStatus, SubmitPayment,
};
pub use server::{CreateServer, Server};
