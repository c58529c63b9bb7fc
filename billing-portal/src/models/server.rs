//! Server (tenant) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A customer's hosted environment. Invoices, payments and announcements are
/// all scoped to exactly one server, identified by its domain name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Server {
    pub server_id: Uuid,
    pub name: String,
    /// Days after an invoice's due date before the dunning engine escalates
    /// from overdue to suspension.
    pub grace_days: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a server.
#[derive(Debug, Clone)]
pub struct CreateServer {
    pub name: String,
    pub grace_days: i32,
}
