//! Alert model: lightweight admin-facing event feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub alert_id: Uuid,
    pub server_id: Uuid,
    pub user_id: Option<Uuid>,
    pub alert_type: String,
    pub message: String,
    pub acknowledged: bool,
    pub created_utc: DateTime<Utc>,
}

/// Alert row joined with its server's domain, for admin listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminAlertRow {
    pub alert_id: Uuid,
    pub alert_type: String,
    pub message: String,
    pub acknowledged: bool,
    pub created_utc: DateTime<Utc>,
    pub domain: String,
}

/// Filter parameters for the admin alert listing.
#[derive(Debug, Clone, Default)]
pub struct ListAlertsFilter {
    pub alert_type: Option<String>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}
