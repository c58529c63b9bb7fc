//! Announcement model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing announcement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    DueSoon,
    Overdue,
    Suspended,
}

impl AnnouncementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementKind::DueSoon => "due_soon",
            AnnouncementKind::Overdue => "overdue",
            AnnouncementKind::Suspended => "suspended",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "due_soon" => Some(AnnouncementKind::DueSoon),
            "overdue" => Some(AnnouncementKind::Overdue),
            "suspended" => Some(AnnouncementKind::Suspended),
            _ => None,
        }
    }
}

/// Announcement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementStatus {
    Active,
    Archived,
}

impl AnnouncementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementStatus::Active => "active",
            AnnouncementStatus::Archived => "archived",
        }
    }
}

/// A time-windowed, tenant-visible notice reflecting billing state.
///
/// An active `suspended` announcement is the authoritative "service suspended"
/// signal; archiving it is the unlock gate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Announcement {
    pub announcement_id: Uuid,
    pub server_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a manual announcement.
#[derive(Debug, Clone)]
pub struct CreateAnnouncement {
    pub server_id: Uuid,
    pub kind: AnnouncementKind,
    pub title: String,
    pub body: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Input for updating a manual announcement. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateAnnouncement {
    pub kind: Option<AnnouncementKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}
